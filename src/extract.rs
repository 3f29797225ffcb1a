//! HTML extraction from raw generation text.
//!
//! Backends are asked to wrap the document in `START_MARKER`/`END_MARKER`.
//! The end marker is usually configured as a stop sequence, so a missing
//! end marker is the normal case, not an error.

/// Marker opening the generated document
pub const START_MARKER: &str = "<!-- START HTML -->";

/// Marker closing the generated document
pub const END_MARKER: &str = "<!-- END HTML -->";

/// Below this many characters an extraction is flagged low-confidence
pub const MIN_PLAUSIBLE_CHARS: usize = 100;

/// How the document was located in the raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    /// Both markers present, end after start
    Bounded,
    /// Start marker present, end marker missing or misplaced
    Truncated,
    /// No start marker; the raw text is kept as-is
    Fallback,
}

impl ExtractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionKind::Bounded => "bounded",
            ExtractionKind::Truncated => "truncated",
            ExtractionKind::Fallback => "fallback",
        }
    }
}

/// Extraction output. Always persisted, even when low-confidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub html: String,
    pub kind: ExtractionKind,
    pub low_confidence: bool,
}

/// Locate the document in `text`.
///
/// Bounded output keeps both markers. Truncated output runs from the start
/// marker to the end of the text. Without a start marker the full text is
/// returned unchanged.
pub fn extract_html(text: &str) -> Extraction {
    let (html, kind) = match text.find(START_MARKER) {
        Some(start) => {
            let search_from = start + START_MARKER.len();
            match text[search_from..].find(END_MARKER) {
                Some(offset) => {
                    let end = search_from + offset + END_MARKER.len();
                    (&text[start..end], ExtractionKind::Bounded)
                }
                None => (&text[start..], ExtractionKind::Truncated),
            }
        }
        None => (text, ExtractionKind::Fallback),
    };

    Extraction {
        html: html.to_string(),
        kind,
        low_confidence: html.chars().count() < MIN_PLAUSIBLE_CHARS,
    }
}
