//! Turns raw collection entries into a schedule snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use crate::{schedule::RawCollectionEntry, waste_type::WasteType};

/// One date of a per-type schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionDate {
    pub date: NaiveDate,
    pub weekday: Option<String>,
}

/// The dates of a single waste type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerTypeSchedule {
    pub waste_type: WasteType,
    /// Every date of this type, ascending.
    pub dates: Vec<CollectionDate>,
    /// The earliest date on or after today.
    pub next_collection: Option<NaiveDate>,
    pub next_weekday: Option<String>,
    pub days_until: Option<i64>,
}

impl PerTypeSchedule {
    /// Project the next collection of this type, if there is one.
    pub fn next(&self) -> Option<NextCollection> {
        let (date, days_until) = (self.next_collection?, self.days_until?);
        Some(NextCollection {
            date,
            weekday: self.next_weekday.clone(),
            waste_type: self.waste_type,
            days_until,
            icon: self.waste_type.icon(),
            color: self.waste_type.color(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextCollection {
    pub date: NaiveDate,
    pub weekday: Option<String>,
    pub waste_type: WasteType,
    pub days_until: i64,
    pub icon: &'static str,
    pub color: &'static str,
}

/// The fully derived result of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSnapshot {
    /// When the document was fetched, set by whoever fetched it.
    pub retrieved_at: Option<DateTime<Local>>,
    /// The day `days_until` is counted from.
    pub today: NaiveDate,
    /// Every parsed entry, ascending by date.
    pub entries: Vec<RawCollectionEntry>,
    /// One schedule for each known waste type, even if it has no dates.
    pub waste_types: BTreeMap<WasteType, PerTypeSchedule>,
    /// The next collection of each waste type that has one, ascending by date.
    pub next_collections: Vec<NextCollection>,
    pub next_collection: Option<NextCollection>,
}

impl ScheduleSnapshot {
    pub fn retrieved(mut self, retrieved_at: DateTime<Local>) -> Self {
        self.retrieved_at = Some(retrieved_at);
        self
    }

    pub fn waste_type(&self, waste_type: WasteType) -> Option<&PerTypeSchedule> {
        self.waste_types.get(&waste_type)
    }

    pub fn total_dates(&self) -> usize {
        self.entries.len()
    }

    /// The first `limit` upcoming collections across all waste types.
    pub fn upcoming(&self, limit: usize) -> &[NextCollection] {
        &self.next_collections[..limit.min(self.next_collections.len())]
    }
}

/// Derive the snapshot of `entries` as seen on `today`.
///
/// A collection on `today` counts as upcoming. Entries without a known waste type
/// only show up in [`ScheduleSnapshot::entries`].
pub fn normalize(mut entries: Vec<RawCollectionEntry>, today: NaiveDate) -> ScheduleSnapshot {
    // stable, keeps document order for equal dates
    entries.sort_by_key(|entry| entry.date);

    let waste_types: BTreeMap<WasteType, PerTypeSchedule> = WasteType::ALL
        .into_iter()
        .map(|waste_type| (waste_type, per_type_schedule(&entries, waste_type, today)))
        .collect();

    let mut next_collections: Vec<NextCollection> = WasteType::ALL
        .into_iter()
        .filter_map(|waste_type| waste_types[&waste_type].next())
        .collect();
    next_collections.sort_by_key(|next| next.date);
    let next_collection = next_collections.first().cloned();

    ScheduleSnapshot {
        retrieved_at: None,
        today,
        entries,
        waste_types,
        next_collections,
        next_collection,
    }
}

fn per_type_schedule(
    entries: &[RawCollectionEntry],
    waste_type: WasteType,
    today: NaiveDate,
) -> PerTypeSchedule {
    let dates: Vec<CollectionDate> = entries
        .iter()
        .filter(|entry| entry.waste_type == Some(waste_type))
        .map(|entry| CollectionDate {
            date: entry.date,
            weekday: entry.weekday.clone(),
        })
        .collect();
    let next = dates.iter().find(|date| date.date >= today);
    PerTypeSchedule {
        waste_type,
        next_collection: next.map(|next| next.date),
        next_weekday: next.and_then(|next| next.weekday.clone()),
        days_until: next.map(|next| (next.date - today).num_days()),
        dates,
    }
}
