use crate::error::{AnalysisError, Result};
use crate::models::record::{AssociationYearRecord, MemberCostPoint};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;

const RECORD_COLUMNS: [&str; 5] = ["id", "year", "activities", "total_members", "approved_grants"];
const MEMBERSHIP_COLUMNS: [&str; 3] = ["id", "members", "cost"];

/// Parse an association-year table. Extra columns are ignored; `flagged` is optional.
pub fn parse_records<R: Read>(reader: R) -> Result<Vec<AssociationYearRecord>> {
    let mut csv = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = csv.headers()?.clone();
    let [id, year, activities, total_members, approved_grants] = locate(&headers, RECORD_COLUMNS)?;
    let flagged = position(&headers, "flagged");

    let mut records = Vec::new();
    for (index, row) in csv.records().enumerate() {
        let row = row?;
        // Header is line 1, so data starts at line 2.
        let line = index + 2;
        records.push(AssociationYearRecord {
            id: parse_integer(&row, id, "id", line)?,
            year: parse_year(&row, year, line)?,
            activities: parse_integer(&row, activities, "activities", line)?,
            total_members: parse_integer(&row, total_members, "total_members", line)?,
            approved_grants: parse_integer(&row, approved_grants, "approved_grants", line)?,
            flagged: match flagged {
                Some(col) => parse_flag(&row, col, line)?,
                None => None,
            },
        });
    }

    log::debug!("Parsed {} association-year records", records.len());
    Ok(records)
}

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<AssociationYearRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    parse_records(file)
}

/// Parse a membership/cost table for the anomaly view.
pub fn parse_membership<R: Read>(reader: R) -> Result<Vec<MemberCostPoint>> {
    let mut csv = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = csv.headers()?.clone();
    let [id, members, cost] = locate(&headers, MEMBERSHIP_COLUMNS)?;

    let mut points = Vec::new();
    for (index, row) in csv.records().enumerate() {
        let row = row?;
        let line = index + 2;
        points.push(MemberCostPoint {
            id: parse_integer(&row, id, "id", line)?,
            members: parse_float(&row, members, "members", line)?,
            cost: parse_float(&row, cost, "cost", line)?,
        });
    }
    Ok(points)
}

pub fn load_membership(path: impl AsRef<Path>) -> Result<Vec<MemberCostPoint>> {
    let file = std::fs::File::open(path.as_ref())?;
    parse_membership(file)
}

fn position(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn locate<const N: usize>(headers: &StringRecord, names: [&str; N]) -> Result<[usize; N]> {
    let mut out = [0usize; N];
    for (slot, name) in out.iter_mut().zip(names) {
        *slot = position(headers, name).ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
    }
    Ok(out)
}

fn cell<'r>(row: &'r StringRecord, col: usize) -> &'r str {
    row.get(col).unwrap_or("")
}

fn malformed(column: &str, line: usize, value: &str) -> AnalysisError {
    AnalysisError::MalformedValue {
        row: line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Integers may arrive as `2020` or `2020.0`; fractional parts are truncated.
fn parse_integer(row: &StringRecord, col: usize, column: &str, line: usize) -> Result<i64> {
    let raw = cell(row, col);
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.trunc() as i64),
        _ => Err(malformed(column, line, raw)),
    }
}

fn parse_year(row: &StringRecord, col: usize, line: usize) -> Result<i32> {
    let value = parse_integer(row, col, "year", line)?;
    i32::try_from(value).map_err(|_| malformed("year", line, cell(row, col)))
}

fn parse_float(row: &StringRecord, col: usize, column: &str, line: usize) -> Result<f64> {
    let raw = cell(row, col);
    raw.parse::<f64>().map_err(|_| malformed(column, line, raw))
}

fn parse_flag(row: &StringRecord, col: usize, line: usize) -> Result<Option<bool>> {
    let raw = cell(row, col);
    match raw.to_ascii_lowercase().as_str() {
        "" | "na" | "nan" => Ok(None),
        "1" | "1.0" | "true" | "yes" | "ja" => Ok(Some(true)),
        "0" | "0.0" | "false" | "no" | "nej" => Ok(Some(false)),
        _ => Err(malformed("flagged", line, raw)),
    }
}
