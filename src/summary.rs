//! Plain-text rendering of an extracted tour, ready to paste into a
//! booking page or a chat message.

use std::fmt::Write as _;

use crate::models::TourExtraction;
use crate::pipeline::structuring::ParsedReply;

/// Render the copy-ready summary.
///
/// Itinerary days keep the order the model returned them in.
pub fn render_summary(tour: &TourExtraction) -> String {
    let mut out = String::new();

    let title = tour.tour_title.trim();
    if !title.is_empty() {
        let _ = writeln!(out, "{title}");
    }

    let shamsi = tour.flight_info.shamsi.trim();
    let gregorian = tour.flight_info.gregorian.trim();
    match (shamsi.is_empty(), gregorian.is_empty()) {
        (false, false) => {
            let _ = writeln!(out, "Flight: {shamsi} ({gregorian})");
        }
        (false, true) => {
            let _ = writeln!(out, "Flight: {shamsi}");
        }
        (true, false) => {
            let _ = writeln!(out, "Flight: {gregorian}");
        }
        (true, true) => {}
    }
    if !out.is_empty() {
        out.push('\n');
    }

    for day in &tour.itinerary {
        let _ = write!(
            out,
            "📅 {} | {}\n{}\n\n",
            day.date_gregorian.trim(),
            day.day_title.trim(),
            day.content_summary.trim()
        );
    }

    if tour.has_services() {
        let _ = write!(out, "Services\n{}\n\n", tour.services_text.trim());
    }
    if tour.has_flight_details() {
        let _ = write!(out, "Flight details\n{}\n\n", tour.flight_details_text.trim());
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push('\n');
    out
}

/// Render a reply. Unparseable replies come back as their raw text.
pub fn render_reply(reply: &ParsedReply) -> String {
    match reply {
        ParsedReply::Structured(tour) => render_summary(tour),
        ParsedReply::Unparseable { raw, .. } => raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlightInfo, ItineraryDay};

    fn sample() -> TourExtraction {
        TourExtraction {
            tour_title: "Istanbul 4 Nights".into(),
            flight_info: FlightInfo {
                shamsi: "15 مهر 1404".into(),
                gregorian: "2025-10-07".into(),
            },
            services_text: "Hotel 4*, breakfast\nAirport transfers".into(),
            flight_details_text: "Mahan W5 112 IKA 07:30".into(),
            full_pdf_text: "ignored".into(),
            itinerary: vec![
                ItineraryDay {
                    day_number: 1,
                    date_gregorian: "2025-10-07".into(),
                    day_title: "Arrival".into(),
                    content_summary: "Transfer to hotel.".into(),
                },
                ItineraryDay {
                    day_number: 2,
                    date_gregorian: "2025-10-08".into(),
                    day_title: "City tour".into(),
                    content_summary: "Sultanahmet and the Grand Bazaar.".into(),
                },
            ],
        }
    }

    #[test]
    fn full_summary_layout() {
        let text = render_summary(&sample());
        let expected = "Istanbul 4 Nights\n\
Flight: 15 مهر 1404 (2025-10-07)\n\
\n\
📅 2025-10-07 | Arrival\n\
Transfer to hotel.\n\
\n\
📅 2025-10-08 | City tour\n\
Sultanahmet and the Grand Bazaar.\n\
\n\
Services\n\
Hotel 4*, breakfast\n\
Airport transfers\n\
\n\
Flight details\n\
Mahan W5 112 IKA 07:30\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut tour = sample();
        tour.services_text.clear();
        tour.flight_details_text = "  ".into();
        let text = render_summary(&tour);
        assert!(!text.contains("Services"));
        assert!(!text.contains("Flight details"));
        assert!(text.ends_with("Sultanahmet and the Grand Bazaar.\n"));
    }

    #[test]
    fn full_text_is_not_rendered() {
        assert!(!render_summary(&sample()).contains("ignored"));
    }

    #[test]
    fn shamsi_only_flight_line() {
        let mut tour = sample();
        tour.flight_info.gregorian.clear();
        assert!(render_summary(&tour).contains("Flight: 15 مهر 1404\n"));
    }

    #[test]
    fn unparseable_reply_renders_raw() {
        let reply = ParsedReply::Unparseable {
            raw: "model said no".into(),
            reason: "expected value".into(),
        };
        assert_eq!(render_reply(&reply), "model said no");
    }
}
