//! # recital-core
//!
//! State machine behind the recital display server: who may drive the
//! display, where the display cursor is, and what every connected screen
//! should be told after each event.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The server wraps the
//!   [`Coordinator`] in a mutex and feeds it one event at a time.
//! - **Explicit time**: Every entry point takes `now`, so liveness is testable
//!   without sleeping.
//! - **Graceful degradation**: Missing content or config files yield empty
//!   or default values, not errors.
//! - **No I/O in the state machine**: Handlers return an [`Outbox`]; the
//!   transport delivers it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recital_core::{Coordinator, CoordinatorSettings, Library};
//!
//! let library = Library::load(Path::new("data"));
//! let mut coordinator = Coordinator::new(Arc::new(library), CoordinatorSettings::default());
//! let (session_id, greeting) = coordinator.connect(Utc::now());
//! let replies = coordinator.handle_text(session_id, r#"{"type":"declare-role","role":"controller"}"#, Utc::now());
//! ```

pub mod broadcast;
pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod liveness;
pub mod lock;
pub mod payload;
pub mod position;
pub mod registry;
pub mod router;

pub use broadcast::{Delivery, Outbox};
pub use config::*;
pub use content::{ContentEntry, ContentStore, Library};
pub use coordinator::{Coordinator, CoordinatorSettings, HealthSnapshot};
pub use error::{RecitalError, Result};
pub use liveness::{LivenessMonitor, LivenessVerdict};
pub use lock::{ControlLock, Handover, ReleaseReason};
pub use payload::{derive_payload, MISSING_TEXT};
pub use position::Mutation;
pub use registry::{RoleAssignment, Session, SessionRegistry};
