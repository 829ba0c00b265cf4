//! JSON-backed content library.
//!
//! Two files live in the content directory:
//!
//! ```text
//! scripture.json      { "sections": [ { index, name, transliteratedName,
//!                       translatedName, verseCount, verses: [ { index, text,
//!                       transliteration, translation } ] } ] }
//! supplications.json  { "supplications": [ { handle, title,
//!                       lines: [ { text, transliteration, translation } ] } ] }
//! ```
//!
//! `verseCount` is authoritative for bounds, so a section may list only some of
//! its verses. Each file degrades independently: a missing or malformed file
//! leaves that domain empty and logs a warning.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use recital_protocol::{SectionSummary, SupplicationSummary};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use super::{ContentEntry, ContentStore};
use crate::error::{RecitalError, Result};

pub const SCRIPTURE_FILE: &str = "scripture.json";
pub const SUPPLICATIONS_FILE: &str = "supplications.json";

#[derive(Debug, Deserialize)]
struct ScriptureFile {
    #[serde(default)]
    sections: Vec<SectionFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionFile {
    index: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    transliterated_name: String,
    #[serde(default)]
    translated_name: String,
    #[serde(default)]
    verse_count: Option<u32>,
    #[serde(default)]
    verses: Vec<VerseFile>,
}

#[derive(Debug, Deserialize)]
struct VerseFile {
    index: u32,
    #[serde(flatten)]
    line: LineFile,
}

#[derive(Debug, Deserialize)]
struct SupplicationsFile {
    #[serde(default)]
    supplications: Vec<SupplicationFile>,
}

#[derive(Debug, Deserialize)]
struct SupplicationFile {
    handle: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    lines: Vec<LineFile>,
}

#[derive(Debug, Deserialize)]
struct LineFile {
    #[serde(default)]
    text: String,
    #[serde(default)]
    transliteration: String,
    #[serde(default)]
    translation: String,
}

impl From<LineFile> for ContentEntry {
    fn from(line: LineFile) -> Self {
        ContentEntry::new(line.text, line.transliteration, line.translation)
    }
}

#[derive(Debug, Clone)]
struct Section {
    summary: SectionSummary,
    verses: HashMap<u32, ContentEntry>,
}

#[derive(Debug, Clone)]
struct Supplication {
    summary: SupplicationSummary,
    lines: Vec<ContentEntry>,
}

/// In-memory content store.
#[derive(Debug, Clone, Default)]
pub struct Library {
    sections: BTreeMap<u32, Section>,
    supplications: Vec<Supplication>,
    supplication_index: HashMap<String, usize>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both content files from `dir`, degrading each to empty on failure.
    pub fn load(dir: &Path) -> Self {
        let mut library = Library::new();

        match read_json::<ScriptureFile>(&dir.join(SCRIPTURE_FILE)) {
            Ok(file) => library.apply_scripture(file),
            Err(err) => warn!(error = %err, "Scripture content unavailable; domain will be empty"),
        }

        match read_json::<SupplicationsFile>(&dir.join(SUPPLICATIONS_FILE)) {
            Ok(file) => library.apply_supplications(file),
            Err(err) => {
                warn!(error = %err, "Supplication content unavailable; domain will be empty")
            }
        }

        info!(
            dir = %dir.display(),
            sections = library.sections.len(),
            total_sections = library.total_sections(),
            supplications = library.supplications.len(),
            "Content library loaded"
        );
        library
    }

    /// Adds or replaces a section. `summary.verse_count` sets the bound.
    pub fn insert_section(
        &mut self,
        summary: SectionSummary,
        verses: impl IntoIterator<Item = (u32, ContentEntry)>,
    ) {
        let verses = verses
            .into_iter()
            .filter(|(index, _)| *index >= 1 && *index <= summary.verse_count)
            .collect();
        self.sections
            .insert(summary.index, Section { summary, verses });
    }

    /// Appends a supplication; a repeated handle replaces the earlier entry in place.
    pub fn insert_supplication(
        &mut self,
        handle: impl Into<String>,
        title: impl Into<String>,
        lines: Vec<ContentEntry>,
    ) {
        let handle = handle.into();
        let supplication = Supplication {
            summary: SupplicationSummary {
                handle: handle.clone(),
                title: title.into(),
                line_count: lines.len() as u32,
            },
            lines,
        };

        match self.supplication_index.get(&handle) {
            Some(&position) => self.supplications[position] = supplication,
            None => {
                self.supplication_index
                    .insert(handle, self.supplications.len());
                self.supplications.push(supplication);
            }
        }
    }

    fn apply_scripture(&mut self, file: ScriptureFile) {
        for section in file.sections {
            if section.index == 0 {
                warn!(name = %section.name, "Skipping section with index 0");
                continue;
            }

            let listed_max = section
                .verses
                .iter()
                .map(|verse| verse.index)
                .max()
                .unwrap_or(0);
            let verse_count = section.verse_count.unwrap_or(listed_max);
            if listed_max > verse_count {
                warn!(
                    section = section.index,
                    verse_count,
                    listed_max,
                    "Section lists verses beyond its verseCount; extras ignored"
                );
            }

            let summary = SectionSummary {
                index: section.index,
                name: section.name,
                transliterated_name: section.transliterated_name,
                translated_name: section.translated_name,
                verse_count,
            };
            let verses = section
                .verses
                .into_iter()
                .map(|verse| (verse.index, ContentEntry::from(verse.line)));
            self.insert_section(summary, verses);
        }
    }

    fn apply_supplications(&mut self, file: SupplicationsFile) {
        for supplication in file.supplications {
            let handle = supplication.handle.trim().to_string();
            if handle.is_empty() {
                warn!(title = %supplication.title, "Skipping supplication without a handle");
                continue;
            }
            if self.supplication_index.contains_key(&handle) {
                warn!(handle = %handle, "Duplicate supplication handle; later entry wins");
            }
            let lines = supplication
                .lines
                .into_iter()
                .map(ContentEntry::from)
                .collect();
            self.insert_supplication(handle, supplication.title, lines);
        }
    }
}

impl ContentStore for Library {
    fn lookup_scripture(&self, section_index: u32, sub_index: u32) -> ContentEntry {
        self.sections
            .get(&section_index)
            .and_then(|section| section.verses.get(&sub_index))
            .cloned()
            .unwrap_or_else(ContentEntry::missing)
    }

    fn section_bound(&self, section_index: u32) -> u32 {
        self.sections
            .get(&section_index)
            .map(|section| section.summary.verse_count)
            .unwrap_or(0)
    }

    /// Sections are numbered `1..=total`; gaps in the file count as empty sections.
    fn total_sections(&self) -> u32 {
        self.sections.keys().next_back().copied().unwrap_or(0)
    }

    fn section(&self, section_index: u32) -> Option<SectionSummary> {
        self.sections
            .get(&section_index)
            .map(|section| section.summary.clone())
    }

    fn list_sections(&self) -> Vec<SectionSummary> {
        self.sections
            .values()
            .map(|section| section.summary.clone())
            .collect()
    }

    fn lookup_supplication(&self, handle: &str, line_index: u32) -> ContentEntry {
        if line_index == 0 {
            return ContentEntry::missing();
        }
        self.supplication_index
            .get(handle)
            .and_then(|&position| self.supplications[position].lines.get(line_index as usize - 1))
            .cloned()
            .unwrap_or_else(ContentEntry::missing)
    }

    fn supplication_line_bound(&self, handle: &str) -> u32 {
        self.supplication(handle)
            .map(|summary| summary.line_count)
            .unwrap_or(0)
    }

    fn supplication(&self, handle: &str) -> Option<SupplicationSummary> {
        self.supplication_index
            .get(handle)
            .map(|&position| self.supplications[position].summary.clone())
    }

    fn list_supplications(&self) -> Vec<SupplicationSummary> {
        self.supplications
            .iter()
            .map(|supplication| supplication.summary.clone())
            .collect()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(RecitalError::ContentNotFound(path.to_path_buf()));
    }
    let data = fs_err::read(path).map_err(|source| RecitalError::Io {
        context: format!("reading content {}", path.display()),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| RecitalError::ContentMalformed {
        path: path.to_path_buf(),
        source,
    })
}
