//! This crate turns the waste collection calendar published by the municipalities
//! into a typed schedule with the next collection of every waste type.
//!
//! The pages are read from <https://cloud.fxsystems.com.pl/OdbiorySmieci/HarmonogramOnline.dll>.
//! [`client::Client`] fetches them, [`directory`] and [`schedule`] parse them,
//! [`snapshot::normalize`] derives the next collections and [`refresh::Refresher`]
//! keeps the result current.

pub use ical;

pub mod calendar;
pub mod client;
pub mod config;
pub mod directory;
pub mod refresh;
pub mod schedule;
pub mod snapshot;
pub mod waste_type;
