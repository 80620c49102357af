//! Decoding of the immigration dataset's compact encodings: day offsets from
//! the 1960-01-01 epoch, and the small visa/mode code enumerations.

use chrono::{Datelike, Days, NaiveDate};

/// Day zero of the day-offset timestamp encoding.
pub const SAS_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1960, 1, 1) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

/// Days between 1970-01-01 (Arrow `Date32` zero) and the SAS epoch.
pub const SAS_EPOCH_DATE32: i32 = -3653;

/// Offset → calendar date. `None` in, or out of chrono's range, gives `None`.
pub fn decode_day_offset(offset: Option<f64>) -> Option<NaiveDate> {
    let days = offset?;
    if !days.is_finite() {
        return None;
    }
    let days = days.trunc() as i64;
    if days >= 0 {
        SAS_EPOCH.checked_add_days(Days::new(days as u64))
    } else {
        SAS_EPOCH.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Calendar date → offset; inverse of [`decode_day_offset`].
pub fn encode_day_offset(date: NaiveDate) -> i64 {
    (date - SAS_EPOCH).num_days()
}

/// Offset → Arrow `Date32` (days since the Unix epoch).
pub fn offset_to_date32(offset: Option<f64>) -> Option<i32> {
    decode_day_offset(offset).map(|d| encode_day_offset(d) as i32 + SAS_EPOCH_DATE32)
}

pub fn decode_visa(code: Option<f64>) -> &'static str {
    match code {
        Some(c) if c == 1.0 => "Business",
        Some(c) if c == 2.0 => "Pleasure",
        Some(c) if c == 3.0 => "Student",
        _ => "Invalid Visa Type",
    }
}

pub fn decode_mode(code: Option<f64>) -> &'static str {
    match code {
        Some(c) if c == 1.0 => "Air",
        Some(c) if c == 2.0 => "Sea",
        Some(c) if c == 3.0 => "Land",
        _ => "Not reported",
    }
}

/// Calendar decomposition of one day offset, as stored in `dim_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeKey {
    pub sas_timestamp: i32,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    /// ISO-8601 week number.
    pub week: i32,
    /// Sunday = 0.
    pub day_of_week: i32,
    pub quarter: i32,
}

impl TimeKey {
    pub fn from_offset(offset: i32) -> Option<Self> {
        let date = decode_day_offset(Some(offset as f64))?;
        Some(Self {
            sas_timestamp: offset,
            year: date.year(),
            month: date.month() as i32,
            day: date.day() as i32,
            week: date.iso_week().week() as i32,
            day_of_week: date.weekday().num_days_from_sunday() as i32,
            quarter: (date.month0() / 3 + 1) as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_zero_is_the_epoch() {
        assert_eq!(decode_day_offset(Some(0.0)), Some(SAS_EPOCH));
        assert_eq!(decode_day_offset(None), None);
        assert_eq!(decode_day_offset(Some(f64::NAN)), None);
    }

    #[test]
    fn decoding_round_trips_over_a_range() {
        for n in (-5_000..30_000).step_by(7) {
            let date = decode_day_offset(Some(n as f64)).unwrap();
            assert_eq!(encode_day_offset(date), n);
        }
        // 2016-04-01 is a well-known arrdate in the April extract
        assert_eq!(
            decode_day_offset(Some(20545.0)),
            NaiveDate::from_ymd_opt(2016, 4, 1)
        );
    }

    #[test]
    fn date32_matches_unix_days() {
        assert_eq!(offset_to_date32(Some(0.0)), Some(SAS_EPOCH_DATE32));
        assert_eq!(offset_to_date32(Some(3653.0)), Some(0));
        assert_eq!(offset_to_date32(None), None);
    }

    #[test]
    fn visa_and_mode_codes() {
        assert_eq!(decode_visa(Some(1.0)), "Business");
        assert_eq!(decode_visa(Some(2.0)), "Pleasure");
        assert_eq!(decode_visa(Some(3.0)), "Student");
        assert_eq!(decode_visa(Some(4.0)), "Invalid Visa Type");
        assert_eq!(decode_visa(None), "Invalid Visa Type");
        // only whole codes are valid
        assert_eq!(decode_visa(Some(1.5)), "Invalid Visa Type");
        assert_eq!(decode_visa(Some(2.9999)), "Invalid Visa Type");

        assert_eq!(decode_mode(Some(1.0)), "Air");
        assert_eq!(decode_mode(Some(2.0)), "Sea");
        assert_eq!(decode_mode(Some(3.0)), "Land");
        assert_eq!(decode_mode(Some(9.0)), "Not reported");
        assert_eq!(decode_mode(None), "Not reported");
        assert_eq!(decode_mode(Some(3.9)), "Not reported");
        assert_eq!(decode_mode(Some(f64::NAN)), "Not reported");
    }

    #[test]
    fn time_key_decomposition() {
        // 2016-04-01 was a Friday in ISO week 13
        let key = TimeKey::from_offset(20545).unwrap();
        assert_eq!(
            key,
            TimeKey {
                sas_timestamp: 20545,
                year: 2016,
                month: 4,
                day: 1,
                week: 13,
                day_of_week: 5,
                quarter: 2,
            }
        );
        // 1960-01-01 was a Friday in ISO week 53 of 1959
        let epoch = TimeKey::from_offset(0).unwrap();
        assert_eq!((epoch.week, epoch.day_of_week, epoch.quarter), (53, 5, 1));
    }
}
