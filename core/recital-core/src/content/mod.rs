//! Content store read interface.
//!
//! The coordinator never touches files; it only asks a [`ContentStore`] for text
//! at a position and for the bounds of each domain. "Not found" is a routine
//! answer (sparse datasets are expected), so lookups return a [`ContentEntry`]
//! with `found = false` rather than an error.
//!
//! Scripture is addressed by `(section, sub-index)`, both 1-based. Supplications
//! are addressed by `(handle, line)`, lines 1-based.

mod library;

pub use library::{Library, SCRIPTURE_FILE, SUPPLICATIONS_FILE};

use recital_protocol::{SectionSummary, SupplicationSummary};

/// Displayable text at one position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentEntry {
    pub text: String,
    pub transliteration: String,
    pub translation: String,
    pub found: bool,
}

impl ContentEntry {
    pub fn new(
        text: impl Into<String>,
        transliteration: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            transliteration: transliteration.into(),
            translation: translation.into(),
            found: true,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

pub trait ContentStore: Send + Sync {
    fn lookup_scripture(&self, section_index: u32, sub_index: u32) -> ContentEntry;

    /// Highest valid sub-index in the section, 0 when the section is unknown.
    fn section_bound(&self, section_index: u32) -> u32;

    fn total_sections(&self) -> u32;

    fn section(&self, section_index: u32) -> Option<SectionSummary>;

    fn list_sections(&self) -> Vec<SectionSummary>;

    fn lookup_supplication(&self, handle: &str, line_index: u32) -> ContentEntry;

    /// Highest valid line index, 0 when the handle is unknown.
    fn supplication_line_bound(&self, handle: &str) -> u32;

    fn supplication(&self, handle: &str) -> Option<SupplicationSummary>;

    fn list_supplications(&self) -> Vec<SupplicationSummary>;
}
