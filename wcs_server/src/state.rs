use std::sync::Arc;

use axum::http::StatusCode;
use wcs_core::{client::Client, refresh::Refresher, snapshot::ScheduleSnapshot};

pub struct AppState {
    pub client: Client,
    pub refresher: Arc<Refresher<Client>>,
    /// The display name of the configured municipality.
    pub municipality_name: String,
}

impl AppState {
    /// The current snapshot, or 503 while there is none.
    pub fn snapshot(&self) -> Result<Arc<ScheduleSnapshot>, (StatusCode, String)> {
        self.refresher.snapshot().ok_or_else(|| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                String::from("the schedule is not available yet"),
            )
        })
    }
}
