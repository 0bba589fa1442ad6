use axum::{
    Json,
    extract::{Path, State},
};

use parlor_types::models::ChatMessage;

use crate::auth::AppState;
use crate::error::ApiError;

/// Full history of a room, oldest first. Unknown rooms return `[]`.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    // Run blocking DB query off the async runtime
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.get_messages_by_room(&room)).await??;

    Ok(Json(rows.into_iter().map(|row| row.into_message()).collect()))
}
