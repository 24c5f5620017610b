use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use wcs_core::{
    refresh::{RefreshError, RefreshState},
    snapshot::ScheduleSnapshot,
};

use crate::state::AppState;

/// Serve the refresh state including the current snapshot.
pub async fn current(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Arc<RefreshState>>, (StatusCode, String)> {
    state.snapshot()?;
    Ok(Json(state.refresher.state()))
}

/// Refresh now, or join the refresh that is already running.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Arc<ScheduleSnapshot>>, (StatusCode, String)> {
    let snapshot = state.refresher.refresh().await.map_err(error_response)?;
    Ok(Json(snapshot))
}

fn error_response(err: RefreshError) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use wcs_core::refresh::RefreshError;

    use super::error_response;

    #[test]
    fn test_error_response() {
        let (status, body) = error_response(RefreshError::Stale(String::from("timed out")));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "the schedule could not be refreshed: timed out");
    }
}
