//! Solar Hijri (Shamsi) calendar support.
//!
//! Tour documents state dates in the Persian calendar while the output
//! schema needs Gregorian dates. The model is asked to convert, but the
//! answer is cross-checked locally with the arithmetic 33-year cycle
//! algorithm (the same break table used by the common jalaali libraries).
//!
//! Parsing accepts the forms operators actually type or scan:
//! - numeric: `1404/07/15`, `1404-7-15`, `15/07/1404`
//! - month name: `15 مهر 1404`, `پنجشنبه ۱۵ مهر`, `15 Mehr 1404`
//!
//! Persian (`۰-۹`) and Arabic-Indic (`٠-٩`) digits are normalized first.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Years (Shamsi) at which the leap pattern of the 33-year cycle breaks.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Gregorian year = Shamsi year + this offset (for dates after 1 Farvardin).
const GREGORIAN_OFFSET: i32 = 621;

const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 3177;

/// Persian and transliterated month names, indexed by month - 1.
const MONTH_NAMES: [&[&str]; 12] = [
    &["فروردین", "farvardin"],
    &["اردیبهشت", "ordibehesht"],
    &["خرداد", "khordad"],
    &["تیر", "tir"],
    &["مرداد", "امرداد", "mordad", "amordad"],
    &["شهریور", "shahrivar", "sharivar"],
    &["مهر", "mehr"],
    &["آبان", "ابان", "aban"],
    &["آذر", "اذر", "azar"],
    &["دی", "dey", "dei"],
    &["بهمن", "bahman"],
    &["اسفند", "esfand"],
];

static YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\s*[/\-.]\s*(\d{1,2})\s*[/\-.]\s*(\d{1,2})$").unwrap()
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s*[/\-.]\s*(\d{1,2})\s*[/\-.]\s*(\d{4})$").unwrap()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Shamsi year {0} is outside the supported range")]
    YearOutOfRange(i32),

    #[error("Invalid Shamsi date {year}/{month}/{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("Gregorian date {0} cannot be represented")]
    GregorianOutOfRange(String),

    #[error("Unrecognized Shamsi date: '{0}'")]
    Unrecognized(String),

    #[error("Shamsi date '{0}' has no year and no default year was given")]
    MissingYear(String),
}

/// A date in the Solar Hijri calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShamsiDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl ShamsiDate {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(CalendarError::YearOutOfRange(year));
        }
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(CalendarError::InvalidDate { year, month, day });
        }
        Ok(Self { year, month, day })
    }

    pub fn to_gregorian(&self) -> Result<NaiveDate, CalendarError> {
        let cal = jal_cal(self.year)?;
        let new_year = NaiveDate::from_ymd_opt(cal.gregorian_year, 3, cal.march_day)
            .ok_or(CalendarError::YearOutOfRange(self.year))?;

        let month = self.month as i64;
        // First six months have 31 days, the next five 30.
        let offset = (month - 1) * 31 - (month / 7) * (month - 7) + self.day as i64 - 1;

        new_year
            .checked_add_signed(Duration::days(offset))
            .ok_or(CalendarError::YearOutOfRange(self.year))
    }

    pub fn from_gregorian(date: NaiveDate) -> Result<Self, CalendarError> {
        let gregorian_year = date.year();
        let mut year = gregorian_year - GREGORIAN_OFFSET;
        let cal = jal_cal(year).map_err(|_| CalendarError::GregorianOutOfRange(date.to_string()))?;
        let new_year = NaiveDate::from_ymd_opt(gregorian_year, 3, cal.march_day)
            .ok_or_else(|| CalendarError::GregorianOutOfRange(date.to_string()))?;

        let mut k = (date - new_year).num_days();
        if k >= 0 {
            if k <= 185 {
                return Self::new(year, 1 + (k / 31) as u32, (k % 31) as u32 + 1);
            }
            k -= 186;
        } else {
            // Before 1 Farvardin: the tail of the previous Shamsi year.
            year -= 1;
            k += 179;
            if cal.leap == 1 {
                k += 1;
            }
        }

        Self::new(year, 7 + (k / 30) as u32, (k % 30) as u32 + 1)
    }
}

impl std::fmt::Display for ShamsiDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Whether a Shamsi year has 366 days (30 days in Esfand).
pub fn is_leap_year(year: i32) -> bool {
    jal_cal(year).map(|cal| cal.leap == 0).unwrap_or(false)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1..=6 => 31,
        7..=11 => 30,
        12 if is_leap_year(year) => 30,
        12 => 29,
        _ => 0,
    }
}

/// Convert a Shamsi date to Gregorian.
pub fn shamsi_to_gregorian(year: i32, month: u32, day: u32) -> Result<NaiveDate, CalendarError> {
    ShamsiDate::new(year, month, day)?.to_gregorian()
}

/// Replace Persian and Arabic-Indic digits with ASCII digits and unify
/// Arabic yeh/kaf with their Persian forms.
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '\u{200c}')
        .map(|c| match c {
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            'ي' => 'ی',
            'ك' => 'ک',
            _ => c,
        })
        .collect()
}

/// Parse a Shamsi date string.
///
/// `default_year` fills in the year when the text only names a day and a
/// month, which is common in itinerary headings.
pub fn parse_shamsi(input: &str, default_year: Option<i32>) -> Result<ShamsiDate, CalendarError> {
    let normalized = normalize_digits(input);
    let text = normalized.trim();
    if text.is_empty() {
        return Err(CalendarError::Unrecognized(input.to_string()));
    }

    if let Some(caps) = YEAR_FIRST.captures(text) {
        return ShamsiDate::new(
            parse_number(&caps[1])? as i32,
            parse_number(&caps[2])?,
            parse_number(&caps[3])?,
        );
    }
    if let Some(caps) = DAY_FIRST.captures(text) {
        return ShamsiDate::new(
            parse_number(&caps[3])? as i32,
            parse_number(&caps[2])?,
            parse_number(&caps[1])?,
        );
    }

    let tokens: Vec<String> = text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '،' | '/' | '-' | '.'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    let month = tokens
        .iter()
        .find_map(|t| month_from_name(t))
        .ok_or_else(|| CalendarError::Unrecognized(input.to_string()))?;

    let numbers: Vec<&String> = tokens
        .iter()
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .collect();

    let day = numbers
        .iter()
        .find(|t| t.len() <= 2)
        .ok_or_else(|| CalendarError::Unrecognized(input.to_string()))
        .and_then(|t| parse_number(t))?;

    let year = match numbers.iter().find(|t| t.len() == 4) {
        Some(t) => parse_number(t)? as i32,
        None => default_year.ok_or_else(|| CalendarError::MissingYear(input.to_string()))?,
    };

    ShamsiDate::new(year, month, day)
}

/// Parse a Gregorian `YYYY-MM-DD` string, tolerating surrounding whitespace
/// and non-ASCII digits.
pub fn parse_gregorian(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(normalize_digits(input).trim(), "%Y-%m-%d").ok()
}

fn month_from_name(token: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|names| names.contains(&token))
        .map(|i| i as u32 + 1)
}

fn parse_number(digits: &str) -> Result<u32, CalendarError> {
    digits
        .parse()
        .map_err(|_| CalendarError::Unrecognized(digits.to_string()))
}

/// Leap status and Nowruz date for one Shamsi year.
struct JalCal {
    /// Years since the last leap year (0 means this year is leap).
    leap: i32,
    gregorian_year: i32,
    /// Day in March of the Gregorian year on which 1 Farvardin falls.
    march_day: u32,
}

fn jal_cal(year: i32) -> Result<JalCal, CalendarError> {
    if year < BREAKS[0] || year >= BREAKS[BREAKS.len() - 1] {
        return Err(CalendarError::YearOutOfRange(year));
    }

    let gregorian_year = year + GREGORIAN_OFFSET;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;

    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if year < jm {
            break;
        }
        leap_j += (jump / 33) * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = year - jp;
    leap_j += (n / 33) * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gregorian_year / 4 - ((gregorian_year / 100 + 1) * 3) / 4 - 150;
    let march_day = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + ((jump + 4) / 33) * 33;
    }
    let mut leap = (((n + 1) % 33) - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Ok(JalCal {
        leap,
        gregorian_year,
        march_day: march_day as u32,
    })
}
