//! Exports a schedule snapshot as an iCalendar document.

use std::sync::LazyLock;

use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property},
    ical_param, ical_property,
};
use regex::Regex;

use crate::{
    snapshot::{CollectionDate, ScheduleSnapshot},
    waste_type::{WasteType, WasteTypeBitmask},
};

static PROD_ID: [&str; 2] = ["Harmonogram odbioru odpadów", "fxsystems.com.pl"];
static TIMEZONE: &str = "Europe/Warsaw";
static FORMAT: &str = "%Y%m%d";

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid regex"));

/// The place the calendar is about.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub municipality_id: &'a str,
    pub municipality_name: &'a str,
    pub street: &'a str,
}

/// Build the calendar from a snapshot, with one event per waste type that has dates.
pub fn build(
    snapshot: &ScheduleSnapshot,
    location: Location,
    excluded_waste_types: WasteTypeBitmask,
) -> IcalCalendar {
    let changed = snapshot
        .retrieved_at
        .map(|retrieved_at| retrieved_at.naive_local())
        .unwrap_or_else(|| snapshot.today.and_time(chrono::NaiveTime::MIN))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let only = WasteType::ALL
        .into_iter()
        .find(|waste_type| excluded_waste_types == WasteTypeBitmask::all_except(*waste_type));
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id(only))
        .build();
    for (waste_type, schedule) in &snapshot.waste_types {
        if excluded_waste_types.excludes(*waste_type) {
            continue;
        }
        if let Some(event) = get_event(location, *waste_type, &schedule.dates, &changed) {
            calendar.events.push(event);
        }
    }
    calendar
}

/// Build an event from the dates of one waste type.
fn get_event(
    location: Location,
    waste_type: WasteType,
    dates: &[CollectionDate],
    changed: &str,
) -> Option<IcalEvent> {
    let first = dates.first()?;
    Some(
        IcalEventBuilder::tzid(TIMEZONE)
            .uid(uid(location, waste_type))
            .changed(changed)
            .one_day(first.date.format(FORMAT).to_string())
            .set(ical_property!("SUMMARY", waste_type.name_pl()))
            .set(ical_property!(
                "RDATE",
                dates
                    .iter()
                    .map(|date| date.date.format(FORMAT).to_string())
                    .collect::<Vec<String>>()
                    .join(","),
                ical_param!("VALUE", "DATE")
            ))
            .set(ical_property!(
                "LOCATION",
                format!("{}, {}", location.street, location.municipality_name)
            ))
            .set(ical_property!("CATEGORIES", waste_type.code()))
            .set(ical_property!("COLOR", waste_type.color()))
            .set(ical_property!("TRANSP", "TRANSPARENT"))
            .build(),
    )
}

fn prod_id(only: Option<WasteType>) -> String {
    let mut strings: Vec<String> = Vec::from(PROD_ID).into_iter().map(String::from).collect();
    if let Some(waste_type) = only {
        strings.splice(0..0, [String::from(waste_type.name_pl())]);
    }
    strings.splice(0..0, [String::from("-")]);
    strings.join("//")
}

/// Get a unique id for a specific waste type at a specific location.
///
/// Changing this function is a breaking change!
fn uid(location: Location, waste_type: WasteType) -> String {
    let street = WHITESPACE_REGEX.replace_all(location.street, "-");
    format!(
        "Harmonogram_{}_{street}_{}@fxsystems.com.pl",
        location.municipality_id,
        waste_type.code()
    )
}
