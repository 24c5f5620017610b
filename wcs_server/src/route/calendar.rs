use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use wcs_core::{
    calendar::{self, Location},
    ical::generator::Emitter,
    waste_type::{WasteType, WasteTypeBitmask},
};

use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeQueryParams {
    #[serde(default)]
    exclude_biodegradable: bool,
    #[serde(default)]
    exclude_mixed: bool,
    #[serde(default)]
    exclude_plastic: bool,
    #[serde(default)]
    exclude_paper: bool,
    #[serde(default)]
    exclude_glass: bool,
    #[serde(default)]
    exclude_ash: bool,
}

impl From<&ExcludeQueryParams> for WasteTypeBitmask {
    fn from(value: &ExcludeQueryParams) -> Self {
        let mut waste_type_bitmask = WasteTypeBitmask::none();
        if value.exclude_biodegradable {
            waste_type_bitmask |= WasteTypeBitmask::Biodegradable;
        }
        if value.exclude_mixed {
            waste_type_bitmask |= WasteTypeBitmask::Mixed;
        }
        if value.exclude_plastic {
            waste_type_bitmask |= WasteTypeBitmask::PlasticAndMetal;
        }
        if value.exclude_paper {
            waste_type_bitmask |= WasteTypeBitmask::Paper;
        }
        if value.exclude_glass {
            waste_type_bitmask |= WasteTypeBitmask::Glass;
        }
        if value.exclude_ash {
            waste_type_bitmask |= WasteTypeBitmask::Ash;
        }
        waste_type_bitmask
    }
}

pub fn handle(
    state: &AppState,
    excluded_waste_types: WasteTypeBitmask,
) -> Result<Response, (StatusCode, String)> {
    let snapshot = state.snapshot()?;
    let config = state.refresher.config();
    let location = Location {
        municipality_id: &config.municipality_id,
        municipality_name: &state.municipality_name,
        street: &config.street,
    };
    let ical_calendar = calendar::build(&snapshot, location, excluded_waste_types);
    let response = ([(CONTENT_TYPE, "text/calendar")], ical_calendar.generate()).into_response();
    Ok(response)
}

/// Handle calendar requests.
///
/// Waste types can be left out with `exclude_<type>=true` in the query string.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    Query(query_params): Query<ExcludeQueryParams>,
) -> Result<Response, (StatusCode, String)> {
    handle(&state, WasteTypeBitmask::from(&query_params))
}

/// Handle calendar requests for a single waste type given by its code.
pub async fn single_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let waste_type = parse_waste_type(&code)?;
    handle(&state, WasteTypeBitmask::all_except(waste_type))
}

fn parse_waste_type(code: &str) -> Result<WasteType, (StatusCode, String)> {
    WasteType::from_code(code).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("{code:?} is not a known waste type"),
        )
    })
}
