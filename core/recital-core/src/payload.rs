//! Content payload derivation.
//!
//! Payloads are computed from the position state and the content store on every
//! read. Nothing here is cached: a payload reflects the store as it is at the
//! moment of derivation.

use recital_protocol::{
    ContentPayload, Domain, PositionState, ScriptureDetails, ScripturePosition,
    SupplicationDetails, SupplicationPosition,
};

use crate::content::{ContentEntry, ContentStore};

/// Shown in place of the original-script text when the store has no entry.
pub const MISSING_TEXT: &str = "Content not available for this position";

pub fn derive_payload(store: &dyn ContentStore, state: &PositionState) -> ContentPayload {
    match state.mode {
        Domain::Scripture => scripture_payload(store, &state.scripture),
        Domain::Supplication => supplication_payload(store, &state.supplication),
    }
}

fn scripture_payload(store: &dyn ContentStore, position: &ScripturePosition) -> ContentPayload {
    let section = store.section(position.section_index);
    let entry = store.lookup_scripture(position.section_index, position.sub_index);

    let (section_name, transliterated_name, translated_name, verse_count) = match section {
        Some(summary) => (
            summary.name,
            summary.transliterated_name,
            summary.translated_name,
            summary.verse_count,
        ),
        None => (String::new(), String::new(), String::new(), 0),
    };

    let label = if !transliterated_name.is_empty() {
        transliterated_name.as_str()
    } else if !section_name.is_empty() {
        section_name.as_str()
    } else {
        "Section"
    };
    let header = format!(
        "{} {}:{}",
        label, position.section_index, position.sub_index
    );

    let details = ScriptureDetails {
        section_index: position.section_index,
        sub_index: position.sub_index,
        section_name,
        transliterated_name,
        translated_name,
        verse_count,
        total_sections: store.total_sections(),
    };

    let mut payload = base_payload(Domain::Scripture, header, entry);
    payload.scripture = Some(details);
    payload
}

fn supplication_payload(
    store: &dyn ContentStore,
    position: &SupplicationPosition,
) -> ContentPayload {
    let summary = store.supplication(&position.handle);
    let entry = store.lookup_supplication(&position.handle, position.line_index);

    let (title, line_count) = match summary {
        Some(summary) => (summary.title, summary.line_count),
        None => (String::new(), 0),
    };
    let label = if title.is_empty() {
        "Supplication"
    } else {
        title.as_str()
    };
    let header = format!("{} ({}/{})", label, position.line_index, line_count);

    let details = SupplicationDetails {
        handle: position.handle.clone(),
        title,
        line_index: position.line_index,
        line_count,
    };

    let mut payload = base_payload(Domain::Supplication, header, entry);
    payload.supplication = Some(details);
    payload
}

fn base_payload(domain: Domain, header: String, entry: ContentEntry) -> ContentPayload {
    if entry.found {
        ContentPayload {
            domain,
            header,
            text: entry.text,
            transliteration: entry.transliteration,
            translation: entry.translation,
            missing: false,
            scripture: None,
            supplication: None,
        }
    } else {
        ContentPayload {
            domain,
            header,
            text: MISSING_TEXT.to_string(),
            transliteration: String::new(),
            translation: String::new(),
            missing: true,
            scripture: None,
            supplication: None,
        }
    }
}
