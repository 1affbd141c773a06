use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    model_family::{
        VALIDATION_INVALID_AADHAAR, VALIDATION_INVALID_DOB, VALIDATION_INVALID_PAN,
        VALIDATION_REQUIRED_FIELD,
    },
    AppError, AppResult,
};

static PAN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("PAN pattern to compile"));

static AADHAAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{12}$").expect("Aadhaar pattern to compile"));

/// PAN is optional: the empty string passes.
pub fn validate_pan(pan: &str) -> bool {
    pan.is_empty() || PAN_PATTERN.is_match(pan)
}

/// Aadhaar is optional: the empty string passes.
pub fn validate_aadhaar(aadhaar: &str) -> bool {
    aadhaar.is_empty() || AADHAAR_PATTERN.is_match(aadhaar)
}

fn positive_int(part: &str) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse::<u32>().ok().filter(|value| *value > 0)
}

/// Converts `dd/mm/yyyy` into `yyyy-mm-dd`.
///
/// Only the ranges month 1..=12 and day 1..=31 are checked; day counts per
/// month and leap years are not.
pub fn display_to_iso(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let day = positive_int(parts[0])?;
    let month = positive_int(parts[1])?;
    let year = positive_int(parts[2])?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Converts a stored `yyyy-mm-dd` (optionally followed by a `T` time part)
/// back to `dd/mm/yyyy`. Returns an empty string when the value is not a
/// date.
pub fn iso_to_display(value: &str) -> String {
    parse_iso(value)
        .map(|(year, month, day)| format!("{day:02}/{month:02}/{year:04}"))
        .unwrap_or_default()
}

fn parse_iso(value: &str) -> Option<(u32, u32, u32)> {
    let date = value.trim().split('T').next()?;
    let parts: Vec<&str> = date.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year = positive_int(parts[0])?;
    let month = positive_int(parts[1])?;
    let day = positive_int(parts[2])?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((year, month, day))
}

/// Age in whole years counted from the birth year alone.
pub fn age_in_year(dob_iso: &str, current_year: i32) -> Option<i32> {
    let (year, _, _) = parse_iso(dob_iso)?;
    i32::try_from(year).ok().map(|year| current_year - year)
}

pub fn require(field: &'static str, value: &str, label: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(
            AppError::new(VALIDATION_REQUIRED_FIELD, format!("{label} is required."))
                .with_context("field", field),
        )
    } else {
        Ok(())
    }
}

/// Trims and checks a PAN form value, mapping empty to `None`.
pub fn check_pan(value: &str) -> AppResult<Option<String>> {
    let pan = value.trim();
    if !validate_pan(pan) {
        return Err(AppError::new(
            VALIDATION_INVALID_PAN,
            "Invalid PAN format. Expected 5 letters, 4 digits and 1 letter (e.g. ABCDE1234F).",
        )
        .with_context("pan", pan.to_string()));
    }
    Ok(Some(pan.to_string()).filter(|pan| !pan.is_empty()))
}

pub fn check_aadhaar(value: &str) -> AppResult<Option<String>> {
    let aadhaar = value.trim();
    if !validate_aadhaar(aadhaar) {
        return Err(
            AppError::new(VALIDATION_INVALID_AADHAAR, "Aadhaar must be 12 digits.")
                .with_context("length", aadhaar.chars().count().to_string()),
        );
    }
    Ok(Some(aadhaar.to_string()).filter(|aadhaar| !aadhaar.is_empty()))
}

pub fn check_dob(value: &str) -> AppResult<Option<String>> {
    let dob = value.trim();
    if dob.is_empty() {
        return Ok(None);
    }
    display_to_iso(dob).map(Some).ok_or_else(|| {
        AppError::new(
            VALIDATION_INVALID_DOB,
            "Invalid Date of Birth. Use dd/mm/yyyy",
        )
        .with_context("dob", dob.to_string())
    })
}
