use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppResult;
use crate::llm::StatusSnapshot;

#[derive(Debug, Deserialize)]
pub struct SwitchBody {
    #[serde(default)]
    pub provider: String,
}

pub async fn switch_provider(
    State(state): State<AppState>,
    Json(body): Json<SwitchBody>,
) -> AppResult<Json<Value>> {
    let provider = state.router.switch_provider(&body.provider)?;

    Ok(Json(json!({
        "success": true,
        "provider": provider,
        "message": format!("Successfully switched to {provider}"),
    })))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.router.status_snapshot().await)
}
