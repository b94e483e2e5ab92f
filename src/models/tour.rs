use serde::{Deserialize, Deserializer, Serialize};

/// Structured extraction of one tour document.
///
/// Every field tolerates absence: earlier prompt revisions only asked for
/// the title, flight date and itinerary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TourExtraction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tour_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flight_info: FlightInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub services_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flight_details_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_pdf_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub itinerary: Vec<ItineraryDay>,
}

/// Departure date as written in the document and converted to Gregorian.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub shamsi: String,
    /// `YYYY-MM-DD`
    #[serde(default, deserialize_with = "null_as_default")]
    pub gregorian: String,
}

/// One day of the itinerary, in whatever order the model returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    #[serde(deserialize_with = "day_number_lenient")]
    pub day_number: u32,
    /// `YYYY-MM-DD`
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_gregorian: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub day_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_summary: String,
}

impl TourExtraction {
    pub fn has_services(&self) -> bool {
        !self.services_text.trim().is_empty()
    }

    pub fn has_flight_details(&self) -> bool {
        !self.flight_details_text.trim().is_empty()
    }
}

/// Models write `null` for values they could not find; treat it as absent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Models occasionally quote numbers (`"day_number": "2"`); accept both.
fn day_number_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => crate::calendar::normalize_digits(&s)
            .trim()
            .parse()
            .map_err(serde::de::Error::custom),
    }
}
