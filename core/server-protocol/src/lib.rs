//! Real-time protocol types and validation for recital-server.
//!
//! This crate is shared by the server and the core state machine to prevent
//! schema drift. Inbound messages are parsed in two stages: the frame must be a
//! JSON object with a string `type`, then the known types are decoded with
//! lenient field coercion. Out-of-range numbers are not rejected here; the core
//! clamps them into bounds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024; // 64KB

pub const ERROR_INVALID_MESSAGE: &str = "invalid_message";
pub const ERROR_MESSAGE_TOO_LARGE: &str = "message_too_large";
pub const ERROR_NOT_ACTIVE_CONTROLLER: &str = "not_active_controller";
pub const ERROR_INVALID_ROLE: &str = "invalid_role";

pub type SessionId = u64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_message() -> Self {
        Self::new(ERROR_INVALID_MESSAGE, "Invalid message format")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shared Vocabulary
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unspecified,
    Viewer,
    Controller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unspecified => "unspecified",
            Role::Viewer => "viewer",
            Role::Controller => "controller",
        }
    }
}

/// Content domain. Named `mode` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Scripture,
    Supplication,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scripture => "scripture",
            Domain::Supplication => "supplication",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Previous,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Inbound (session -> server)
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded inbound message. Indices are carried as signed values so that
/// zero, negative and saturated inputs reach the clamping step intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    DeclareRole { role: Role },
    Heartbeat,
    RequestBootstrap,
    SetMode { mode: Domain },
    SetScripturePosition { section_index: i64, sub_index: i64 },
    SetSupplicationPosition { handle: String, line_index: i64 },
    Step { direction: Direction },
}

impl ClientMessage {
    /// Mutating commands are only honored from the current lock holder.
    pub fn requires_lock_holder(&self) -> bool {
        matches!(
            self,
            ClientMessage::SetMode { .. }
                | ClientMessage::SetScripturePosition { .. }
                | ClientMessage::SetSupplicationPosition { .. }
                | ClientMessage::Step { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::DeclareRole { .. } => "declare-role",
            ClientMessage::Heartbeat => "heartbeat",
            ClientMessage::RequestBootstrap => "request-bootstrap",
            ClientMessage::SetMode { .. } => "set-mode",
            ClientMessage::SetScripturePosition { .. } => "set-scripture-position",
            ClientMessage::SetSupplicationPosition { .. } => "set-supplication-position",
            ClientMessage::Step { .. } => "step",
        }
    }
}

/// Parses one inbound text frame.
///
/// Returns `Ok(None)` for a well-formed object whose `type` is not recognized;
/// those are ignored by the server without a reply.
pub fn parse_client_message(raw: &str) -> Result<Option<ClientMessage>, ErrorInfo> {
    if raw.len() > MAX_MESSAGE_BYTES {
        return Err(ErrorInfo::new(
            ERROR_MESSAGE_TOO_LARGE,
            "message exceeded maximum size",
        ));
    }

    let value: Value = serde_json::from_str(raw).map_err(|_| ErrorInfo::invalid_message())?;
    let object = value.as_object().ok_or_else(ErrorInfo::invalid_message)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(ErrorInfo::invalid_message)?;

    let message = match kind {
        "declare-role" => ClientMessage::DeclareRole {
            role: parse_declared_role(object)?,
        },
        "heartbeat" => ClientMessage::Heartbeat,
        "request-bootstrap" => ClientMessage::RequestBootstrap,
        "set-mode" => ClientMessage::SetMode {
            mode: parse_enum_field(object, "mode")?,
        },
        "set-scripture-position" => ClientMessage::SetScripturePosition {
            section_index: coerce_index(object.get("sectionIndex")),
            sub_index: coerce_index(object.get("subIndex")),
        },
        "set-supplication-position" => ClientMessage::SetSupplicationPosition {
            handle: coerce_handle(object.get("handle")),
            line_index: coerce_index(object.get("lineIndex")),
        },
        "step" => ClientMessage::Step {
            direction: parse_enum_field(object, "direction")?,
        },
        _ => return Ok(None),
    };

    Ok(Some(message))
}

fn parse_declared_role(object: &Map<String, Value>) -> Result<Role, ErrorInfo> {
    match object.get("role").and_then(Value::as_str) {
        Some("viewer") => Ok(Role::Viewer),
        Some("controller") => Ok(Role::Controller),
        _ => Err(ErrorInfo::new(
            ERROR_INVALID_ROLE,
            "role must be \"viewer\" or \"controller\"",
        )),
    }
}

fn parse_enum_field<T: serde::de::DeserializeOwned>(
    object: &Map<String, Value>,
    field: &str,
) -> Result<T, ErrorInfo> {
    let value = object.get(field).ok_or_else(ErrorInfo::invalid_message)?;
    serde_json::from_value(value.clone()).map_err(|_| ErrorInfo::invalid_message())
}

/// Coerces a loosely typed index. Numeric strings are accepted, fractions are
/// truncated, huge values saturate and anything else becomes 0.
fn coerce_index(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|_| i64::MAX))
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .map(|float| float as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn coerce_handle(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(|handle| handle.trim().to_string())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Position & Content
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScripturePosition {
    pub section_index: u32,
    pub sub_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplicationPosition {
    pub handle: String,
    pub line_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub mode: Domain,
    pub scripture: ScripturePosition,
    pub supplication: SupplicationPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptureDetails {
    pub section_index: u32,
    pub sub_index: u32,
    pub section_name: String,
    pub transliterated_name: String,
    pub translated_name: String,
    pub verse_count: u32,
    pub total_sections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplicationDetails {
    pub handle: String,
    pub title: String,
    pub line_index: u32,
    pub line_count: u32,
}

/// Derived display content for the current position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    pub domain: Domain,
    pub header: String,
    pub text: String,
    pub transliteration: String,
    pub translation: String,
    pub missing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripture: Option<ScriptureDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplication: Option<SupplicationDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub index: u32,
    pub name: String,
    pub transliterated_name: String,
    pub translated_name: String,
    pub verse_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplicationSummary {
    pub handle: String,
    pub title: String,
    pub line_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lock & Bootstrap
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub controller_connected: bool,
    pub is_active_controller: bool,
    pub locked_by_another: bool,
}

/// Client-facing display options carried in `bootstrap.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub show_transliteration: bool,
    pub show_translation: bool,
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub display_url: String,
    pub controller_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub session_count: usize,
    pub viewer_count: usize,
    pub controller_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapPayload {
    pub role: Role,
    pub position_state: PositionState,
    pub content_payload: ContentPayload,
    pub sections: Vec<SectionSummary>,
    pub supplications: Vec<SupplicationSummary>,
    pub config: DisplaySettings,
    pub connection_info: ConnectionInfo,
    pub lock_status: LockStatus,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Outbound (server -> session)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Connected {
        session_id: SessionId,
    },
    Bootstrap(Box<BootstrapPayload>),
    StateUpdate {
        position_state: PositionState,
        content_payload: ContentPayload,
    },
    LockStatus(LockStatus),
    ViewerConnectivity {
        controller_connected: bool,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(info: ErrorInfo) -> Self {
        ServerMessage::Error {
            code: info.code,
            message: info.message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Bootstrap(_) => "bootstrap",
            ServerMessage::StateUpdate { .. } => "state-update",
            ServerMessage::LockStatus(_) => "lock-status",
            ServerMessage::ViewerConnectivity { .. } => "viewer-connectivity",
            ServerMessage::Error { .. } => "error",
        }
    }
}
