use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use wcs_core::directory::{MunicipalityRecord, StreetQueryResult};

use crate::state::AppState;

pub async fn municipalities(State(state): State<Arc<AppState>>) -> Json<Vec<MunicipalityRecord>> {
    Json(state.client.list_municipalities().await)
}

pub async fn streets(
    State(state): State<Arc<AppState>>,
    Path(municipality_id): Path<String>,
) -> Json<StreetQueryResult> {
    Json(state.client.list_streets(&municipality_id).await)
}
