// src/codes.rs
//! Loader for the I94 label description file.
//!
//! The file declares SAS formats, one `value <name>` block per code table,
//! each terminated by a line holding a single `;`. Only two blocks are read:
//!
//! ```text
//!   value i94cntyl
//!    582 =  'MEXICO Air Sea, and Not Reported (I-94, no land arrivals)'
//!    236 =  'AFGHANISTAN'
//! ;
//!   value $i94prtl
//!     'ALC'   =   'ALCAN, AK             '
//! ;
//! ```

use std::{collections::BTreeMap, fs, path::Path};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub const COUNTRY_MARKER: &str = "value i94cntyl";
pub const PORT_MARKER: &str = "value $i94prtl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub code: String,
    pub city: String,
    pub state: String,
}

#[derive(Debug, Clone, Default)]
pub struct CodeTables {
    /// Country code → country name.
    pub countries: BTreeMap<String, String>,
    /// Ports in file order.
    pub ports: Vec<Port>,
}

/// Remove the quoting and whitespace characters the label file wraps values in.
fn strip_line(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '"' | '\'' | '\t' | '\n' | '\r'))
        .collect()
}

/// Find the lines strictly between `marker` and the next `;` line.
/// Returns `(first_line_number, lines)` with 1-based line numbers.
fn section<'a>(lines: &[&'a str], marker: &str) -> Result<(usize, Vec<&'a str>)> {
    let start = lines
        .iter()
        .position(|l| l.trim().eq_ignore_ascii_case(marker))
        .ok_or_else(|| PipelineError::LabelFormat {
            line: 0,
            message: format!("section marker `{}` not found", marker),
        })?;

    let body = &lines[start + 1..];
    let end = body
        .iter()
        .position(|l| l.trim() == ";")
        .ok_or_else(|| PipelineError::LabelFormat {
            line: start + 1,
            message: format!("section `{}` has no terminating `;`", marker),
        })?;

    Ok((start + 2, body[..end].to_vec()))
}

fn is_skippable(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || (t.starts_with("/*") && t.ends_with("*/"))
}

/// Split `key = value` on the first `=`; both halves must be non-empty.
fn split_entry(line: &str, line_no: usize) -> Result<(String, String)> {
    let cleaned = strip_line(line);
    let (key, value) = cleaned
        .split_once('=')
        .ok_or_else(|| PipelineError::LabelFormat {
            line: line_no,
            message: format!("expected `code = value`, got `{}`", line.trim()),
        })?;
    let key: String = key.chars().filter(|c| *c != ' ').collect();
    let value = value.trim().to_string();
    if key.is_empty() || value.is_empty() {
        return Err(PipelineError::LabelFormat {
            line: line_no,
            message: "empty code or value".into(),
        });
    }
    Ok((key, value))
}

pub fn parse_countries(lines: &[&str]) -> Result<BTreeMap<String, String>> {
    let (first, body) = section(lines, COUNTRY_MARKER)?;
    let mut out = BTreeMap::new();
    for (i, line) in body.iter().enumerate() {
        if is_skippable(line) {
            continue;
        }
        let line_no = first + i;
        let (code, name) = split_entry(line, line_no)?;
        if out.insert(code.clone(), name).is_some() {
            return Err(PipelineError::LabelFormat {
                line: line_no,
                message: format!("duplicate country code `{}`", code),
            });
        }
    }
    debug!(count = out.len(), "parsed country codes");
    Ok(out)
}

pub fn parse_ports(lines: &[&str]) -> Result<Vec<Port>> {
    let (first, body) = section(lines, PORT_MARKER)?;
    let mut seen = BTreeMap::new();
    let mut out = Vec::with_capacity(body.len());
    for (i, line) in body.iter().enumerate() {
        if is_skippable(line) {
            continue;
        }
        let line_no = first + i;
        let (code, value) = split_entry(line, line_no)?;
        if let Some(prev) = seen.insert(code.clone(), line_no) {
            return Err(PipelineError::LabelFormat {
                line: line_no,
                message: format!("duplicate port code `{}` (first on line {})", code, prev),
            });
        }

        // "ALCAN, AK" → ("ALCAN", "AK"); no comma → whole value for both
        let city = value.split(',').next().unwrap_or(&value).trim().to_string();
        let state: String = value
            .rsplit(',')
            .next()
            .unwrap_or(&value)
            .chars()
            .filter(|c| *c != ' ')
            .collect();
        if city.is_empty() || state.is_empty() {
            return Err(PipelineError::LabelFormat {
                line: line_no,
                message: format!("port `{}` has an empty city or state", code),
            });
        }
        out.push(Port { code, city, state });
    }
    debug!(count = out.len(), "parsed port codes");
    Ok(out)
}

pub fn parse_labels(content: &str) -> Result<CodeTables> {
    let lines: Vec<&str> = content.lines().collect();
    Ok(CodeTables {
        countries: parse_countries(&lines)?,
        ports: parse_ports(&lines)?,
    })
}

#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<CodeTables> {
    let raw = fs::read(path.as_ref())?;
    // the published file is Latin-1 in places
    let content = String::from_utf8_lossy(&raw);
    let tables = parse_labels(&content)?;
    info!(
        countries = tables.countries.len(),
        ports = tables.ports.len(),
        "loaded code tables"
    );
    Ok(tables)
}
