//! Parsers for the municipality directory and the street list of a municipality.

use std::{
    fmt::{Display, Formatter},
    sync::LazyLock,
};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

pub static UNKNOWN_MUNICIPALITY: &str = "Unknown municipality";

static MUNICIPALITY_OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select#selGmina option").expect("invalid selector"));
static STREET_OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select#selUlica option").expect("invalid selector"));
static STREET_SELECT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select#selUlica").expect("invalid selector"));
static HEADER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h4").expect("invalid selector"));

static MUNICIPALITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
            woj\.:\s(?P<province>[\w\s-]+?)\s* # the province
            powiat:\s(?P<district>[\w\s-]+?)\s* # the district
            gmina:\s(?P<municipality>[\w\s-]+) # the municipality
        ",
    )
    .expect("invalid regex")
});
static MUNICIPALITY_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dla gminy: (?P<name>[\w\s-]+)").expect("invalid regex"));

/// A municipality as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MunicipalityRecord {
    pub id: String,
    pub province: String,
    pub district: String,
    pub municipality: String,
    /// The option text as printed by the directory.
    pub full_name: String,
}

impl Display for MunicipalityRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.municipality, self.district, self.province
        )
    }
}

/// The streets served in one municipality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreetQueryResult {
    pub municipality_name: String,
    pub streets: Vec<String>,
}

impl StreetQueryResult {
    pub fn unknown() -> Self {
        Self {
            municipality_name: String::from(UNKNOWN_MUNICIPALITY),
            streets: vec![],
        }
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse the directory page into municipality records, in document order.
///
/// Options without a value and options whose text is not in the
/// `woj.: … powiat: … gmina: …` form are skipped.
pub fn parse_municipalities(html: &str) -> Vec<MunicipalityRecord> {
    let dom = Html::parse_document(html);
    let mut municipalities = vec![];
    for option in dom.select(&MUNICIPALITY_OPTION_SELECTOR) {
        let Some(id) = option.value().attr("value").filter(|value| !value.is_empty()) else {
            continue;
        };
        let full_name = text_of(option);
        let Some(captures) = MUNICIPALITY_REGEX.captures(&full_name) else {
            log::debug!("skipping directory option {full_name:?}");
            continue;
        };
        municipalities.push(MunicipalityRecord {
            id: id.to_string(),
            province: captures["province"].trim().to_string(),
            district: captures["district"].trim().to_string(),
            municipality: captures["municipality"].trim().to_string(),
            full_name: full_name.clone(),
        });
    }
    if municipalities.is_empty() {
        log::error!("no municipalities found in the directory page");
    }
    municipalities
}

/// Parse a municipality page into its display name and street names.
pub fn parse_streets(html: &str) -> StreetQueryResult {
    let dom = Html::parse_document(html);
    let municipality_name = dom
        .select(&HEADER_SELECTOR)
        .next()
        .map(|header| header.text().collect::<String>())
        .and_then(|header| {
            MUNICIPALITY_NAME_REGEX
                .captures(&header)
                .map(|captures| captures["name"].trim().to_string())
        })
        .unwrap_or_else(|| {
            log::warn!("could not find the municipality name");
            String::from(UNKNOWN_MUNICIPALITY)
        });
    if dom.select(&STREET_SELECT_SELECTOR).next().is_none() {
        log::error!("could not find the street list");
        return StreetQueryResult {
            municipality_name,
            streets: vec![],
        };
    }
    let streets = dom
        .select(&STREET_OPTION_SELECTOR)
        .filter(|option| {
            let element = option.value();
            ["hidden", "disabled", "selected"]
                .into_iter()
                .all(|placeholder| element.attr(placeholder).is_none())
        })
        .map(text_of)
        .collect();
    StreetQueryResult {
        municipality_name,
        streets,
    }
}
