//! Point-in-time HTTP endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use recital_core::HealthSnapshot;
use recital_protocol::{BootstrapPayload, Role, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct BootstrapQuery {
    #[serde(default)]
    role: Option<String>,
}

/// Anything other than `controller` is treated as a viewer.
fn parse_role(raw: Option<&str>) -> Role {
    match raw.map(str::trim) {
        Some("controller") => Role::Controller,
        _ => Role::Viewer,
    }
}

pub async fn bootstrap(
    State(state): State<Arc<SharedState>>,
    Query(query): Query<BootstrapQuery>,
) -> Json<BootstrapPayload> {
    Json(state.bootstrap(parse_role(query.role.as_deref())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    protocol_version: u32,
    #[serde(flatten)]
    snapshot: HealthSnapshot,
}

pub async fn health(State(state): State<Arc<SharedState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: PROTOCOL_VERSION,
        snapshot: state.health(),
    })
}
