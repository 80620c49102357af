// src/transform/sql.rs
//! DDL and extraction statements for the star schema.
//!
//! Identity keys are sequences feeding a `DEFAULT nextval(..)` primary key.
//! Temperature lookups are averaged per upper-cased name so a join never
//! fans a dimension row out.

pub const CREATE_COUNTRIES: &str = "
CREATE TABLE dim_countries (
    country_id BIGINT DEFAULT nextval('dim_countries_seq') PRIMARY KEY,
    country_code VARCHAR(3) NOT NULL UNIQUE,
    country VARCHAR(256) NOT NULL UNIQUE,
    average_temperature DECIMAL(16,3)
);";

pub const EXTRACT_COUNTRIES: &str = "
INSERT INTO dim_countries (country_code, country, average_temperature)
SELECT c.country_code, c.country, t.average_temperature
FROM (
    SELECT DISTINCT c.country_code, c.country
    FROM staging_immigration i
    INNER JOIN staging_countries c ON i.origin_country_code = c.country_code
) c
LEFT JOIN (
    SELECT UPPER(country) AS country_key, AVG(average_temperature) AS average_temperature
    FROM staging_temperatures
    GROUP BY UPPER(country)
) t ON UPPER(c.country) = t.country_key
ORDER BY c.country;";

pub const CREATE_PORTS: &str = "
CREATE TABLE dim_ports (
    port_id BIGINT DEFAULT nextval('dim_ports_seq') PRIMARY KEY,
    port_code VARCHAR(3) NOT NULL UNIQUE,
    port_city VARCHAR(256),
    port_state VARCHAR(50),
    average_temperature DECIMAL(16,3)
);";

pub const EXTRACT_PORTS: &str = "
INSERT INTO dim_ports (port_code, port_city, port_state, average_temperature)
SELECT p.port_code, p.city, p.state, t.average_temperature
FROM (
    SELECT DISTINCT p.port_code, p.city, p.state
    FROM staging_immigration i
    INNER JOIN staging_ports p ON i.port_code = p.port_code
) p
LEFT JOIN (
    SELECT UPPER(city) AS city_key, AVG(average_temperature) AS average_temperature
    FROM staging_temperatures
    GROUP BY UPPER(city)
) t ON UPPER(p.city) = t.city_key
ORDER BY p.port_code;";

pub const CREATE_AIRPORTS: &str = "
CREATE TABLE dim_airports (
    airport_id BIGINT DEFAULT nextval('dim_airports_seq') PRIMARY KEY,
    port_id BIGINT UNIQUE REFERENCES dim_ports (port_id),
    airport_type VARCHAR(256),
    airport_name VARCHAR(256),
    elevation_ft INTEGER,
    municipality VARCHAR(256),
    gps_code VARCHAR(256),
    local_code VARCHAR(256),
    coordinates VARCHAR(256)
);";

/// Links through `dim_ports`, so it only sees ports extracted before it.
pub const EXTRACT_AIRPORTS: &str = "
INSERT INTO dim_airports (port_id, airport_type, airport_name, elevation_ft,
                          municipality, gps_code, local_code, coordinates)
SELECT p.port_id, a.type, a.name, a.elevation_ft,
       a.municipality, a.gps_code, a.local_code, a.coordinates
FROM staging_airports a
INNER JOIN dim_ports p ON a.ident = p.port_code
ORDER BY p.port_code;";

pub const CREATE_DEMOGRAPHICS: &str = "
CREATE TABLE dim_demographics (
    demographics_id BIGINT DEFAULT nextval('dim_demographics_seq') PRIMARY KEY,
    port_id BIGINT REFERENCES dim_ports (port_id),
    median_age DECIMAL(18,2),
    male_population BIGINT,
    female_population BIGINT,
    total_population BIGINT,
    number_of_veterans BIGINT,
    foreign_born BIGINT,
    avg_household_size DECIMAL(18,2),
    race VARCHAR(100),
    demo_count BIGINT,
    UNIQUE (port_id, race)
);";

pub const EXTRACT_DEMOGRAPHICS: &str = "
INSERT INTO dim_demographics (port_id, median_age, male_population, female_population,
                              total_population, number_of_veterans, foreign_born,
                              avg_household_size, race, demo_count)
SELECT DISTINCT p.port_id, d.median_age, d.male_population, d.female_population,
       d.total_population, d.number_of_veterans, d.foreign_born,
       d.average_household_size, d.race, d.count
FROM dim_ports p
INNER JOIN staging_demographics d
    ON UPPER(p.port_city) = UPPER(d.city) AND UPPER(p.port_state) = UPPER(d.state_code)
WHERE EXISTS (SELECT 1 FROM staging_immigration i WHERE i.port_code = p.port_code);";

pub const CREATE_TIME: &str = "
CREATE TABLE dim_time (
    sas_timestamp INTEGER NOT NULL PRIMARY KEY,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    day INTEGER NOT NULL,
    week INTEGER NOT NULL,
    day_of_week INTEGER NOT NULL,
    quarter INTEGER NOT NULL
);";

/// `week` is the ISO week, `day_of_week` counts from Sunday = 0.
pub const EXTRACT_TIME: &str = "
INSERT INTO dim_time (sas_timestamp, year, month, day, week, day_of_week, quarter)
SELECT ts,
       date_part('year', d),
       date_part('month', d),
       date_part('day', d),
       date_part('week', d),
       date_part('dow', d),
       date_part('quarter', d)
FROM (
    SELECT ts, DATE '1960-01-01' + ts AS d
    FROM (
        SELECT CAST(trunc(arrdate) AS INTEGER) AS ts
        FROM staging_immigration WHERE arrdate IS NOT NULL
        UNION
        SELECT CAST(trunc(depdate) AS INTEGER) AS ts
        FROM staging_immigration WHERE depdate IS NOT NULL
    ) offsets
) days;";

pub const CREATE_FACT: &str = "
CREATE TABLE fact_immigration (
    immigration_id BIGINT DEFAULT nextval('fact_immigration_seq') PRIMARY KEY,
    country_id BIGINT REFERENCES dim_countries (country_id),
    port_id BIGINT REFERENCES dim_ports (port_id),
    age INTEGER,
    travel_mode VARCHAR(100),
    visa_category VARCHAR(100),
    visa_type VARCHAR(100),
    gender VARCHAR(10),
    arrdate INTEGER NOT NULL REFERENCES dim_time (sas_timestamp),
    depdate INTEGER REFERENCES dim_time (sas_timestamp)
);";

/// Rows without a country or port match are dropped, as are rows with no
/// arrival offset (the fact key is mandatory).
pub const EXTRACT_FACT: &str = "
INSERT INTO fact_immigration (country_id, port_id, age, travel_mode, visa_category,
                              visa_type, gender, arrdate, depdate)
SELECT c.country_id, p.port_id, i.age, i.mode, i.visa_category, i.visatype, i.gender,
       CAST(trunc(i.arrdate) AS INTEGER), CAST(trunc(i.depdate) AS INTEGER)
FROM staging_immigration i
INNER JOIN dim_countries c ON i.origin_country_code = c.country_code
INNER JOIN dim_ports p ON i.port_code = p.port_code
WHERE i.arrdate IS NOT NULL;";
