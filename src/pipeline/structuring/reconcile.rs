//! Cross-checks model-reported dates against local calendar conversion.

use chrono::{Duration, NaiveDate};

use crate::calendar::{parse_gregorian, parse_shamsi};
use crate::models::TourExtraction;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fill missing Gregorian dates and report disagreements.
///
/// The model's Gregorian flight date is kept when it parses, even if the
/// local conversion of the Shamsi date differs; the disagreement becomes a
/// warning. Missing itinerary dates are counted from the flight date.
pub fn reconcile_dates(tour: &mut TourExtraction, target_year: i32) -> Vec<String> {
    let mut warnings = Vec::new();

    let shamsi = tour.flight_info.shamsi.trim();
    let local = if shamsi.is_empty() {
        None
    } else {
        match parse_shamsi(shamsi, Some(target_year)).and_then(|d| d.to_gregorian()) {
            Ok(date) => Some(date),
            Err(e) => {
                warnings.push(format!("Flight date not converted locally: {e}"));
                None
            }
        }
    };

    let reported_text = tour.flight_info.gregorian.trim().to_string();
    let reported = parse_gregorian(&reported_text);

    let flight_date = match (local, reported) {
        (Some(local), None) => {
            if !reported_text.is_empty() {
                warnings.push(format!(
                    "Gregorian flight date '{reported_text}' is invalid; replaced with {}",
                    local.format(DATE_FORMAT)
                ));
            }
            tour.flight_info.gregorian = local.format(DATE_FORMAT).to_string();
            Some(local)
        }
        (Some(local), Some(reported)) => {
            if local != reported {
                warnings.push(format!(
                    "Gregorian flight date {} disagrees with local conversion of '{}' ({})",
                    reported.format(DATE_FORMAT),
                    shamsi,
                    local.format(DATE_FORMAT)
                ));
            }
            Some(reported)
        }
        (None, Some(reported)) => Some(reported),
        (None, None) => {
            if !reported_text.is_empty() {
                warnings.push(format!("Gregorian flight date '{reported_text}' is invalid"));
            }
            None
        }
    };

    for day in &mut tour.itinerary {
        let date_text = day.date_gregorian.trim();
        if date_text.is_empty() {
            if let Some(date) = flight_date.and_then(|d| day_offset(d, day.day_number)) {
                day.date_gregorian = date.format(DATE_FORMAT).to_string();
            }
        } else if parse_gregorian(date_text).is_none() {
            warnings.push(format!(
                "Day {}: date '{}' is not a valid Gregorian date",
                day.day_number, date_text
            ));
        }
    }

    warnings
}

/// Day 1 is the flight date itself.
fn day_offset(flight_date: NaiveDate, day_number: u32) -> Option<NaiveDate> {
    let offset = i64::from(day_number.checked_sub(1)?);
    flight_date.checked_add_signed(Duration::days(offset))
}
