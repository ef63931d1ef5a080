use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::print::assemble::{assemble_print_content, PrintWarning};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PrintDataQuery {
    pub resume_id: Uuid,
    pub token: String,
}

#[derive(Serialize)]
pub struct PrintDataResponse {
    pub layout_settings: Value,
    pub items: Vec<Value>,
    pub warnings: Vec<PrintWarning>,
}

/// GET /internal/print-data
///
/// Trusted-worker endpoint: the PDF render worker presents the shared
/// secret and receives render-ready content with images inlined.
pub async fn handle_print_data(
    State(state): State<AppState>,
    Query(params): Query<PrintDataQuery>,
) -> Result<Json<PrintDataResponse>, AppError> {
    if params.token != state.config.internal_api_token {
        return Err(AppError::Unauthorized);
    }

    let resume: Option<ResumeRow> =
        sqlx::query_as("SELECT id, user_id, content, updated_at FROM resumes WHERE id = $1")
            .bind(params.resume_id)
            .fetch_optional(&state.db)
            .await?;
    let resume =
        resume.ok_or_else(|| AppError::NotFound(format!("Resume {} not found", params.resume_id)))?;

    let doc = assemble_print_content(&resume.content, resume.user_id, state.store.as_ref()).await?;

    Ok(Json(PrintDataResponse {
        layout_settings: doc.layout_settings,
        items: doc.items,
        warnings: doc.warnings,
    }))
}
