//! Position state: the single display cursor.
//!
//! Both domains keep their last position while inactive, so switching the mode
//! and switching back resumes where the operator left off.
//!
//! # Bounds
//!
//! Every write goes through clamping against the content store, so a stored
//! position is never out of range, not even transiently. The floor is always 1;
//! an empty or unknown domain collapses to a bound of 1 so that the cursor
//! still has a valid (if missing) position.
//!
//! # Stepping
//!
//! ```text
//! scripture:     (s, last) --next--> (s+1, 1)        unless s is the last section
//!                (s, 1)    --prev--> (s-1, last')    unless s is the first section
//! supplication:  line +/- 1 within the current handle, no wraparound
//! ```

use recital_protocol::{
    ClientMessage, Direction, Domain, PositionState, ScripturePosition, SupplicationPosition,
};

use crate::content::ContentStore;

/// A validated position change. Built from the mutating inbound messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetMode(Domain),
    SetScripture { section_index: i64, sub_index: i64 },
    SetSupplication { handle: String, line_index: i64 },
    Step(Direction),
}

impl Mutation {
    pub fn from_message(message: &ClientMessage) -> Option<Self> {
        match message {
            ClientMessage::SetMode { mode } => Some(Mutation::SetMode(*mode)),
            ClientMessage::SetScripturePosition {
                section_index,
                sub_index,
            } => Some(Mutation::SetScripture {
                section_index: *section_index,
                sub_index: *sub_index,
            }),
            ClientMessage::SetSupplicationPosition { handle, line_index } => {
                Some(Mutation::SetSupplication {
                    handle: handle.clone(),
                    line_index: *line_index,
                })
            }
            ClientMessage::Step { direction } => Some(Mutation::Step(*direction)),
            ClientMessage::DeclareRole { .. }
            | ClientMessage::Heartbeat
            | ClientMessage::RequestBootstrap => None,
        }
    }
}

/// Starting cursor: scripture domain, first verse, first supplication.
pub fn initial_position(store: &dyn ContentStore) -> PositionState {
    let handle = store
        .list_supplications()
        .into_iter()
        .next()
        .map(|summary| summary.handle)
        .unwrap_or_default();

    PositionState {
        mode: Domain::Scripture,
        scripture: ScripturePosition {
            section_index: 1,
            sub_index: 1,
        },
        supplication: SupplicationPosition {
            handle,
            line_index: 1,
        },
    }
}

/// Returns the state after applying `mutation`. The input is never modified;
/// callers compare old and new to decide whether anything changed.
pub fn apply(store: &dyn ContentStore, state: &PositionState, mutation: &Mutation) -> PositionState {
    let mut next = state.clone();
    match mutation {
        Mutation::SetMode(mode) => next.mode = *mode,
        Mutation::SetScripture {
            section_index,
            sub_index,
        } => next.scripture = clamp_scripture(store, *section_index, *sub_index),
        Mutation::SetSupplication { handle, line_index } => {
            if let Some(position) = clamp_supplication(store, handle, *line_index) {
                next.supplication = position;
            }
        }
        Mutation::Step(direction) => match state.mode {
            Domain::Scripture => next.scripture = step_scripture(store, &state.scripture, *direction),
            Domain::Supplication => {
                next.supplication = step_supplication(store, &state.supplication, *direction)
            }
        },
    }
    next
}

pub fn clamp_scripture(
    store: &dyn ContentStore,
    section_index: i64,
    sub_index: i64,
) -> ScripturePosition {
    let section_index = clamp_index(section_index, store.total_sections());
    let sub_index = clamp_index(sub_index, store.section_bound(section_index));
    ScripturePosition {
        section_index,
        sub_index,
    }
}

/// `None` when the handle is not in the store; unknown handles do not move the cursor.
pub fn clamp_supplication(
    store: &dyn ContentStore,
    handle: &str,
    line_index: i64,
) -> Option<SupplicationPosition> {
    store.supplication(handle)?;
    Some(SupplicationPosition {
        handle: handle.to_string(),
        line_index: clamp_index(line_index, store.supplication_line_bound(handle)),
    })
}

fn step_scripture(
    store: &dyn ContentStore,
    current: &ScripturePosition,
    direction: Direction,
) -> ScripturePosition {
    let total = store.total_sections().max(1);
    let section = current.section_index;
    let bound = store.section_bound(section).max(1);

    match direction {
        Direction::Next if current.sub_index < bound => ScripturePosition {
            section_index: section,
            sub_index: current.sub_index + 1,
        },
        Direction::Next if section < total => ScripturePosition {
            section_index: section + 1,
            sub_index: 1,
        },
        Direction::Previous if current.sub_index > 1 => ScripturePosition {
            section_index: section,
            sub_index: current.sub_index - 1,
        },
        Direction::Previous if section > 1 => ScripturePosition {
            section_index: section - 1,
            sub_index: store.section_bound(section - 1).max(1),
        },
        _ => clamp_scripture(store, section as i64, current.sub_index as i64),
    }
}

fn step_supplication(
    store: &dyn ContentStore,
    current: &SupplicationPosition,
    direction: Direction,
) -> SupplicationPosition {
    let delta = match direction {
        Direction::Next => 1,
        Direction::Previous => -1,
    };
    SupplicationPosition {
        handle: current.handle.clone(),
        line_index: clamp_index(
            current.line_index as i64 + delta,
            store.supplication_line_bound(&current.handle),
        ),
    }
}

fn clamp_index(value: i64, bound: u32) -> u32 {
    value.clamp(1, bound.max(1) as i64) as u32
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::content::{ContentEntry, Library};
    use recital_protocol::SectionSummary;

    /// Three sections (7, 286, 4 verses) with sparse text, and two supplications.
    pub(crate) fn sample_library() -> Library {
        let mut library = Library::new();
        for (index, name, verse_count) in [(1, "Al-Fatihah", 7), (2, "Al-Baqarah", 286), (3, "Al-Ikhlas", 4)] {
            library.insert_section(
                SectionSummary {
                    index,
                    name: format!("section-{index}"),
                    transliterated_name: name.to_string(),
                    translated_name: String::new(),
                    verse_count,
                },
                (1..=verse_count)
                    .filter(|verse| index != 2 || *verse == 255)
                    .map(|verse| {
                        (
                            verse,
                            ContentEntry::new(
                                format!("text {index}:{verse}"),
                                format!("translit {index}:{verse}"),
                                format!("translation {index}:{verse}"),
                            ),
                        )
                    }),
            );
        }
        library.insert_supplication(
            "iftitah",
            "Du'a al-Iftitah",
            (1..=5)
                .map(|line| ContentEntry::new(format!("iftitah {line}"), "", ""))
                .collect(),
        );
        library.insert_supplication(
            "kumayl",
            "Du'a Kumayl",
            (1..=3)
                .map(|line| ContentEntry::new(format!("kumayl {line}"), "", ""))
                .collect(),
        );
        library
    }

    fn at_scripture(section_index: u32, sub_index: u32) -> PositionState {
        PositionState {
            mode: Domain::Scripture,
            scripture: ScripturePosition {
                section_index,
                sub_index,
            },
            supplication: SupplicationPosition {
                handle: "iftitah".to_string(),
                line_index: 1,
            },
        }
    }

    #[test]
    fn initial_position_points_at_first_entries() {
        let library = sample_library();
        let state = initial_position(&library);
        assert_eq!(state, at_scripture(1, 1));
    }

    #[test]
    fn set_scripture_clamps_every_component() {
        let library = sample_library();
        let cases: [((i64, i64), (u32, u32)); 6] = [
            ((2, 255), (2, 255)),
            ((2, 999), (2, 286)),
            ((0, 0), (1, 1)),
            ((-5, -5), (1, 1)),
            ((i64::MAX, i64::MAX), (3, 4)),
            ((i64::MIN, 3), (1, 3)),
        ];
        for ((section, sub), expected) in cases {
            let next = apply(
                &library,
                &at_scripture(1, 1),
                &Mutation::SetScripture {
                    section_index: section,
                    sub_index: sub,
                },
            );
            assert_eq!(
                (next.scripture.section_index, next.scripture.sub_index),
                expected,
                "input ({section}, {sub})"
            );
        }
    }

    #[test]
    fn step_next_crosses_into_next_section() {
        let library = sample_library();
        let next = apply(&library, &at_scripture(1, 7), &Mutation::Step(Direction::Next));
        assert_eq!(next.scripture, ScripturePosition { section_index: 2, sub_index: 1 });
    }

    #[test]
    fn step_next_clamps_at_last_verse_of_last_section() {
        let library = sample_library();
        let start = at_scripture(3, 4);
        let next = apply(&library, &start, &Mutation::Step(Direction::Next));
        assert_eq!(next, start);
    }

    #[test]
    fn step_previous_moves_to_previous_section_last_verse() {
        let library = sample_library();
        let next = apply(&library, &at_scripture(3, 1), &Mutation::Step(Direction::Previous));
        assert_eq!(next.scripture, ScripturePosition { section_index: 2, sub_index: 286 });
    }

    #[test]
    fn step_previous_clamps_at_first_verse() {
        let library = sample_library();
        let start = at_scripture(1, 1);
        let next = apply(&library, &start, &Mutation::Step(Direction::Previous));
        assert_eq!(next, start);
    }

    #[test]
    fn step_within_section() {
        let library = sample_library();
        let next = apply(&library, &at_scripture(2, 254), &Mutation::Step(Direction::Next));
        assert_eq!(next.scripture.sub_index, 255);
        let back = apply(&library, &next, &Mutation::Step(Direction::Previous));
        assert_eq!(back.scripture.sub_index, 254);
    }

    #[test]
    fn supplication_steps_clamp_at_both_ends() {
        let library = sample_library();
        let mut state = at_scripture(1, 1);
        state.mode = Domain::Supplication;
        state.supplication.line_index = 5;

        let next = apply(&library, &state, &Mutation::Step(Direction::Next));
        assert_eq!(next, state);

        state.supplication.line_index = 1;
        let previous = apply(&library, &state, &Mutation::Step(Direction::Previous));
        assert_eq!(previous, state);
    }

    #[test]
    fn supplication_position_clamps_and_ignores_unknown_handles() {
        let library = sample_library();
        let state = at_scripture(1, 1);

        let next = apply(
            &library,
            &state,
            &Mutation::SetSupplication {
                handle: "kumayl".to_string(),
                line_index: 40,
            },
        );
        assert_eq!(
            next.supplication,
            SupplicationPosition {
                handle: "kumayl".to_string(),
                line_index: 3
            }
        );

        let unchanged = apply(
            &library,
            &state,
            &Mutation::SetSupplication {
                handle: "unknown".to_string(),
                line_index: 2,
            },
        );
        assert_eq!(unchanged, state);
    }

    #[test]
    fn switching_mode_preserves_both_positions() {
        let library = sample_library();
        let mut state = at_scripture(2, 255);
        state.supplication.line_index = 4;

        let switched = apply(&library, &state, &Mutation::SetMode(Domain::Supplication));
        let stepped = apply(&library, &switched, &Mutation::Step(Direction::Previous));
        assert_eq!(stepped.supplication.line_index, 3);
        assert_eq!(stepped.scripture, state.scripture);

        let back = apply(&library, &stepped, &Mutation::SetMode(Domain::Scripture));
        assert_eq!(back.mode, Domain::Scripture);
        assert_eq!(back.scripture, ScripturePosition { section_index: 2, sub_index: 255 });
    }

    #[test]
    fn empty_store_collapses_to_first_position() {
        let library = Library::new();
        let state = initial_position(&library);
        assert_eq!(state.supplication.handle, "");

        let next = apply(
            &library,
            &state,
            &Mutation::SetScripture {
                section_index: 9,
                sub_index: 9,
            },
        );
        assert_eq!(next.scripture, ScripturePosition { section_index: 1, sub_index: 1 });
        assert_eq!(apply(&library, &next, &Mutation::Step(Direction::Next)), next);
    }

    #[test]
    fn only_mutating_messages_become_mutations() {
        assert_eq!(Mutation::from_message(&ClientMessage::Heartbeat), None);
        assert_eq!(
            Mutation::from_message(&ClientMessage::SetMode {
                mode: Domain::Supplication
            }),
            Some(Mutation::SetMode(Domain::Supplication))
        );
    }
}
