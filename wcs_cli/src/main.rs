use std::{env::current_dir, fs::write};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use wcs_core::{
    calendar::{self, Location},
    client::Client,
    config::ClientConfig,
    ical::generator::Emitter,
    snapshot::{normalize, ScheduleSnapshot},
    waste_type::{WasteType, WasteTypeBitmask},
};

#[derive(Debug, Parser)]
#[command(about = "Waste collection schedules of Polish municipalities")]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// list every municipality
    Municipalities,
    /// list the streets of a municipality
    Streets {
        /// the municipality id
        municipality_id: String,
    },
    /// show the upcoming collections of a street
    Schedule {
        #[command(flatten)]
        street: StreetArgs,
        /// print the whole snapshot as JSON
        #[arg(long)]
        json: bool,
        /// how many upcoming collections to show
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// write the collections of a street to calendar.ics
    Calendar {
        #[command(flatten)]
        street: StreetArgs,
        #[command(flatten)]
        exclude: ExcludeArgs,
    },
}

#[derive(Debug, Args)]
pub struct StreetArgs {
    /// the municipality id
    pub municipality_id: String,
    /// the street
    pub street: String,
}

#[derive(Debug, Args)]
pub struct ExcludeArgs {
    /// exclude biodegradable waste collection dates
    #[arg(long)]
    pub exclude_biodegradable: bool,
    /// exclude mixed waste collection dates
    #[arg(long)]
    pub exclude_mixed: bool,
    /// exclude plastic and metal waste collection dates
    #[arg(long)]
    pub exclude_plastic: bool,
    /// exclude paper waste collection dates
    #[arg(long)]
    pub exclude_paper: bool,
    /// exclude glass waste collection dates
    #[arg(long)]
    pub exclude_glass: bool,
    /// exclude ash collection dates
    #[arg(long)]
    pub exclude_ash: bool,
}

impl From<&ExcludeArgs> for WasteTypeBitmask {
    fn from(value: &ExcludeArgs) -> Self {
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

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Arguments::parse();
    let client = Client::new(ClientConfig::default())?;
    match args.command {
        Command::Municipalities => {
            let municipalities = client.list_municipalities().await;
            if municipalities.is_empty() {
                bail!("no municipalities found");
            }
            for municipality in municipalities {
                println!("{}\t{municipality}", municipality.id);
            }
        }
        Command::Streets { municipality_id } => {
            let result = client.list_streets(&municipality_id).await;
            println!("{}", result.municipality_name);
            for street in result.streets {
                println!("  {street}");
            }
        }
        Command::Schedule {
            street,
            json,
            limit,
        } => {
            let snapshot = fetch_snapshot(&client, &street).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", describe(&snapshot, limit));
            }
        }
        Command::Calendar { street, exclude } => {
            let snapshot = fetch_snapshot(&client, &street).await;
            let streets = client.list_streets(&street.municipality_id).await;
            let location = Location {
                municipality_id: &street.municipality_id,
                municipality_name: &streets.municipality_name,
                street: &street.street,
            };
            let calendar = calendar::build(&snapshot, location, WasteTypeBitmask::from(&exclude));
            let mut path = current_dir()?;
            path.push("calendar.ics");
            write(&path, calendar.generate())?;
            log::info!("wrote {}", path.display());
        }
    }
    Ok(())
}

async fn fetch_snapshot(client: &Client, street: &StreetArgs) -> ScheduleSnapshot {
    let entries = client
        .fetch_schedule(&street.municipality_id, &street.street)
        .await;
    let now = chrono::Local::now();
    normalize(entries, now.date_naive()).retrieved(now)
}

/// Say how far away a collection is.
fn days_until_text(days_until: Option<i64>) -> String {
    match days_until {
        Some(0) => String::from("today!"),
        Some(1) => String::from("tomorrow!"),
        Some(days) => format!("in {days} days"),
        None => String::from("no data"),
    }
}

fn describe(snapshot: &ScheduleSnapshot, limit: usize) -> String {
    let mut text = String::new();
    match &snapshot.next_collection {
        Some(next) => text.push_str(&format!(
            "next collection: {} {} ({}), {}\n",
            next.waste_type,
            next.date,
            next.weekday.as_deref().unwrap_or("-"),
            days_until_text(Some(next.days_until))
        )),
        None => text.push_str("next collection: no data\n"),
    }
    text.push('\n');
    for waste_type in WasteType::ALL {
        let Some(schedule) = snapshot.waste_type(waste_type) else {
            continue;
        };
        let date = schedule
            .next_collection
            .map(|date| date.to_string())
            .unwrap_or_else(|| String::from("-"));
        text.push_str(&format!(
            "{:<28}{date:<12}{}\n",
            waste_type.name_pl(),
            days_until_text(schedule.days_until)
        ));
    }
    let upcoming = snapshot.upcoming(limit);
    if !upcoming.is_empty() {
        text.push_str("\nupcoming:\n");
        for next in upcoming {
            text.push_str(&format!(
                "  {} [{}] {}\n",
                next.date,
                next.waste_type.code(),
                next.waste_type
            ));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;
    use wcs_core::{
        schedule::RawCollectionEntry, snapshot::normalize, waste_type::WasteType,
        waste_type::WasteTypeBitmask,
    };

    use crate::{days_until_text, describe, ExcludeArgs};

    #[test]
    fn test_from_exclude_args_for_waste_type_bitmask() {
        let exclude_args = ExcludeArgs {
            exclude_biodegradable: false,
            exclude_mixed: false,
            exclude_plastic: false,
            exclude_paper: false,
            exclude_glass: false,
            exclude_ash: false,
        };
        assert_eq!(WasteTypeBitmask::from(&exclude_args), WasteTypeBitmask::none());
        let exclude_args = ExcludeArgs {
            exclude_biodegradable: false,
            exclude_mixed: true,
            exclude_plastic: true,
            exclude_paper: false,
            exclude_glass: false,
            exclude_ash: true,
        };
        assert_eq!(
            WasteTypeBitmask::from(&exclude_args),
            WasteTypeBitmask::Mixed
                .or(WasteTypeBitmask::PlasticAndMetal)
                .or(WasteTypeBitmask::Ash)
        );
    }

    #[test]
    fn test_days_until_text() {
        assert_eq!(days_until_text(Some(0)), "today!");
        assert_eq!(days_until_text(Some(1)), "tomorrow!");
        assert_eq!(days_until_text(Some(9)), "in 9 days");
        assert_eq!(days_until_text(None), "no data");
    }

    #[test]
    fn test_describe() {
        let entries = vec![
            RawCollectionEntry {
                date: NaiveDate::from_str("2024-03-15").unwrap(),
                weekday: Some(String::from("piątek")),
                waste_type: Some(WasteType::Mixed),
                label: String::from("zmieszane"),
                color: String::from("#596D81"),
                color_mismatch: false,
            },
            RawCollectionEntry {
                date: NaiveDate::from_str("2024-03-16").unwrap(),
                weekday: Some(String::from("sobota")),
                waste_type: Some(WasteType::Glass),
                label: String::from("szkło"),
                color: String::from("#7EC451"),
                color_mismatch: false,
            },
        ];
        let snapshot = normalize(entries, NaiveDate::from_str("2024-03-15").unwrap());
        let text = describe(&snapshot, 1);
        assert!(text.starts_with("next collection: Zmieszane 2024-03-15 (piątek), today!\n"));
        assert!(text.contains("tomorrow!"));
        assert!(text.contains("  2024-03-15 [ZM] Zmieszane\n"));
        assert!(!text.contains("[SZ]"));
        assert_eq!(text.matches("no data").count(), 4);
    }
}
