//! This server keeps the waste collection schedule of one street up to date and serves it.
//!
//! The schedule is refreshed every `--interval-minutes` and on `POST /refresh`.
//! `/calendar` serves it as iCalendar, `/calendar/<code>` a single waste type only.

mod route;
mod state;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use wcs_core::{
    client::Client,
    config::{interval_from_minutes, ClientConfig, ScheduleConfig},
    refresh::Refresher,
};

use crate::state::AppState;

#[derive(Debug, Parser)]
struct Arguments {
    /// the municipality id
    municipality_id: String,
    /// the street
    street: String,
    /// minutes between two refreshes
    #[arg(long, default_value_t = 720)]
    interval_minutes: u64,
    /// the port to listen on
    #[arg(long, default_value_t = 8008)]
    port: u16,
}

impl Arguments {
    fn refresh_interval(&self) -> Result<Duration, clap::Error> {
        interval_from_minutes(self.interval_minutes).ok_or_else(|| {
            Arguments::command().error(
                ErrorKind::ValueValidation,
                format!("{} minutes is too long an interval", self.interval_minutes),
            )
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Arguments::parse();
    let client = Client::new(ClientConfig::default())?;
    let refresh_interval = args.refresh_interval().unwrap_or_else(|err| err.exit());
    let config = ScheduleConfig::new(args.municipality_id, args.street)
        .with_refresh_interval(refresh_interval);
    let municipality_name = client
        .list_streets(&config.municipality_id)
        .await
        .municipality_name;
    let refresher = Arc::new(Refresher::start(client.clone(), config).await?);
    tokio::spawn(refresher.clone().run());

    let state = Arc::new(AppState {
        client,
        refresher,
        municipality_name,
    });
    let app = Router::new()
        .route("/municipalities", get(route::lookup::municipalities))
        .route(
            "/municipalities/:municipality_id/streets",
            get(route::lookup::streets),
        )
        .route("/schedule", get(route::schedule::current))
        .route("/refresh", post(route::schedule::refresh))
        .route("/calendar", get(route::calendar::handler))
        .route("/calendar/:waste_type", get(route::calendar::single_handler))
        .with_state(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    log::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
