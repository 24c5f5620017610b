//! Parses the schedule page of one street into raw collection entries.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::waste_type::WasteType;

static CARD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.termin.card").expect("invalid selector"));
static SIDE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.bok").expect("invalid selector"));
static HEADER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.naglowek").expect("invalid selector"));
static LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.srodek h3").expect("invalid selector"));

static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<date>\d{4}-\d{2}-\d{2})").expect("invalid regex"));
static WEEKDAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?P<weekday>.*?)\)").expect("invalid regex"));

static COLOR_PROPERTY: &str = "background-color:";

/// Why a single card could not be read.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CardError {
    #[error("the card has no side element")]
    MissingSide,
    #[error("the side element has no style")]
    MissingStyle,
    #[error("the side element style has no background color: {0:?}")]
    MissingColor(String),
    #[error("the card has no header")]
    MissingHeader,
    #[error("the card has no waste type label")]
    MissingLabel,
    #[error("{0:?} is not a calendar date")]
    InvalidDate(String),
}

/// One pickup event as printed on the schedule page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCollectionEntry {
    pub date: NaiveDate,
    pub weekday: Option<String>,
    /// `None` if the label is not one of the known waste types.
    pub waste_type: Option<WasteType>,
    /// The label text as printed.
    pub label: String,
    /// The color painted next to the card.
    pub color: String,
    /// Whether the color belongs to a different waste type than the label.
    pub color_mismatch: bool,
}

/// Parse every card of the schedule page.
///
/// A card that cannot be read is logged and skipped, a card without a date is dropped.
/// The entries are returned in document order.
pub fn parse(html: &str) -> Vec<RawCollectionEntry> {
    let dom = Html::parse_document(html);
    let mut entries = vec![];
    for (index, card) in dom.select(&CARD_SELECTOR).enumerate() {
        match parse_card(card) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => log::debug!("card {index} has no date, skipping"),
            Err(err) => log::error!("error processing card {index}: {err}"),
        }
    }
    entries
}

fn parse_card(card: ElementRef) -> Result<Option<RawCollectionEntry>, CardError> {
    let style = card
        .select(&SIDE_SELECTOR)
        .next()
        .ok_or(CardError::MissingSide)?
        .value()
        .attr("style")
        .ok_or(CardError::MissingStyle)?;
    let color = parse_color(style).ok_or_else(|| CardError::MissingColor(style.to_string()))?;

    let header = card
        .select(&HEADER_SELECTOR)
        .next()
        .ok_or(CardError::MissingHeader)?
        .text()
        .collect::<String>();
    let header = header.trim();
    let Some(captures) = DATE_REGEX.captures(header) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&captures["date"], "%Y-%m-%d")
        .map_err(|_| CardError::InvalidDate(captures["date"].to_string()))?;
    let weekday = WEEKDAY_REGEX
        .captures(header)
        .map(|captures| captures["weekday"].to_string());

    let label = card
        .select(&LABEL_SELECTOR)
        .next()
        .ok_or(CardError::MissingLabel)?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    let waste_type = WasteType::from_label(&label);
    let color_mismatch = match WasteType::from_color(&color) {
        Some(expected) if expected.label() != label.to_lowercase() => {
            log::warn!(
                "color {color} usually means {}, but found {label}",
                expected.label()
            );
            true
        }
        _ => false,
    };

    Ok(Some(RawCollectionEntry {
        date,
        weekday,
        waste_type,
        label,
        color,
        color_mismatch,
    }))
}

/// Extract the value of the `background-color` declaration of an inline style.
fn parse_color(style: &str) -> Option<String> {
    let (_, rest) = style.split_once(COLOR_PROPERTY)?;
    let color = rest.split(';').next().unwrap_or_default().trim();
    if color.is_empty() {
        return None;
    }
    Some(color.to_string())
}
