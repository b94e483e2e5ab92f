use super::types::ExtractionPrompt;

/// User-turn directive sent alongside the document.
pub const EXTRACTION_DIRECTIVE: &str = "Extract tour details from this document.";

/// Build the system instruction for a given Shamsi target year.
///
/// The year only anchors date conversion; it is not validated here.
pub fn build_extraction_instruction(target_year: i32) -> String {
    format!(
        r#"
You are an AI assistant for a travel agency that publishes tour packages.
Target Year (Solar Hijri / Shamsi): {target_year}

Task: Read the provided tour document. Extract:
1. Tour Title.
2. Flight departure date. Give it as written in the document (Shamsi) and converted
   to the Gregorian calendar as YYYY-MM-DD. If the document omits the year, assume {target_year}.
3. Services: the full text of the section listing what the package includes
   (hotel, meals, transfers, insurance, guide, visa...). Copy it verbatim.
4. Flight details: the full text of the section describing flights
   (airline, flight numbers, departure and arrival times). Copy it verbatim.
5. Full document text: all readable text of the document, in reading order.
6. Daily itinerary: one entry per day. Map each day to its Gregorian date
   counted from the departure date (day 1 is the departure date).

Output Format: ONLY valid JSON. No Markdown fences, no commentary before or after.
Use an empty string for any text section that is not present in the document.
Structure:
{{
  "tour_title": "string",
  "flight_info": {{ "shamsi": "string", "gregorian": "YYYY-MM-DD" }},
  "services_text": "string",
  "flight_details_text": "string",
  "full_pdf_text": "string",
  "itinerary": [
    {{ "day_number": 1, "date_gregorian": "YYYY-MM-DD", "day_title": "string", "content_summary": "string" }}
  ]
}}
"#
    )
}

/// Build the prompt pair for one extraction request.
pub fn build_extraction_prompt(target_year: i32) -> ExtractionPrompt {
    ExtractionPrompt {
        system: build_extraction_instruction(target_year),
        directive: EXTRACTION_DIRECTIVE.to_string(),
    }
}

/// Wrap locally extracted text so the model can tell it from instructions.
pub fn wrap_document_text(text: &str) -> String {
    format!("<document>\n{}\n</document>", text.trim())
}
