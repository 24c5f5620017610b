//! The closed set of waste types collected by the municipalities.

use std::fmt::{Display, Formatter};

use bitmask_enum::bitmask;
use serde::{Deserialize, Serialize};

/// One category of collected waste, identified by its short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WasteType {
    #[serde(rename = "B")]
    Biodegradable,
    #[serde(rename = "ZM")]
    Mixed,
    #[serde(rename = "PL")]
    PlasticAndMetal,
    #[serde(rename = "PA")]
    Paper,
    #[serde(rename = "SZ")]
    Glass,
    #[serde(rename = "PO")]
    Ash,
}

impl WasteType {
    /// All waste types in their canonical order.
    pub const ALL: [WasteType; 6] = [
        WasteType::Biodegradable,
        WasteType::Mixed,
        WasteType::PlasticAndMetal,
        WasteType::Paper,
        WasteType::Glass,
        WasteType::Ash,
    ];

    pub fn code(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "B",
            WasteType::Mixed => "ZM",
            WasteType::PlasticAndMetal => "PL",
            WasteType::Paper => "PA",
            WasteType::Glass => "SZ",
            WasteType::Ash => "PO",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "Biodegradable",
            WasteType::Mixed => "Mixed",
            WasteType::PlasticAndMetal => "Plastic and Metal",
            WasteType::Paper => "Paper",
            WasteType::Glass => "Glass",
            WasteType::Ash => "Ash",
        }
    }

    /// The Polish display name.
    pub fn name_pl(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "Biodegradowalne",
            WasteType::Mixed => "Zmieszane",
            WasteType::PlasticAndMetal => "Metale i tworzywa sztuczne",
            WasteType::Paper => "Papier i tektura",
            WasteType::Glass => "Szkło",
            WasteType::Ash => "Popiół",
        }
    }

    /// The label the schedule page prints for this type, lowercased.
    pub fn label(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "biodegradowalne",
            WasteType::Mixed => "zmieszane",
            WasteType::PlasticAndMetal => "metale i tworzywa sztuczne",
            WasteType::Paper => "papier i tektura",
            WasteType::Glass => "szkło",
            WasteType::Ash => "popiół",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "mdi:recycle",
            WasteType::Mixed => "mdi:trash-can",
            WasteType::PlasticAndMetal => "mdi:bottle-soda-outline",
            WasteType::Paper => "mdi:file-outline",
            WasteType::Glass => "mdi:bottle-wine",
            WasteType::Ash => "mdi:fire",
        }
    }

    /// The hex color the schedule page paints next to cards of this type.
    pub fn color(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "#9F703B",
            WasteType::Mixed => "#596D81",
            WasteType::PlasticAndMetal => "#F9C625",
            WasteType::Paper => "#11ADE4",
            WasteType::Glass => "#7EC451",
            WasteType::Ash => "#626262",
        }
    }

    pub fn from_code(code: &str) -> Option<WasteType> {
        WasteType::ALL
            .into_iter()
            .find(|waste_type| waste_type.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Resolve a label as printed on the schedule page.
    ///
    /// The match is exact after trimming and lowercasing.
    pub fn from_label(label: &str) -> Option<WasteType> {
        let label = label.trim().to_lowercase();
        WasteType::ALL
            .into_iter()
            .find(|waste_type| waste_type.label() == label)
    }

    pub fn from_color(color: &str) -> Option<WasteType> {
        WasteType::ALL
            .into_iter()
            .find(|waste_type| waste_type.color().eq_ignore_ascii_case(color.trim()))
    }
}

impl Display for WasteType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name_pl())
    }
}

#[bitmask]
pub enum WasteTypeBitmask {
    Biodegradable,
    Mixed,
    PlasticAndMetal,
    Paper,
    Glass,
    Ash,
}

impl From<WasteType> for WasteTypeBitmask {
    fn from(value: WasteType) -> Self {
        match value {
            WasteType::Biodegradable => WasteTypeBitmask::Biodegradable,
            WasteType::Mixed => WasteTypeBitmask::Mixed,
            WasteType::PlasticAndMetal => WasteTypeBitmask::PlasticAndMetal,
            WasteType::Paper => WasteTypeBitmask::Paper,
            WasteType::Glass => WasteTypeBitmask::Glass,
            WasteType::Ash => WasteTypeBitmask::Ash,
        }
    }
}

impl WasteTypeBitmask {
    /// A mask excluding every waste type except `only`.
    pub fn all_except(only: WasteType) -> Self {
        WasteType::ALL
            .into_iter()
            .filter(|waste_type| *waste_type != only)
            .fold(WasteTypeBitmask::none(), |mask, waste_type| {
                mask | WasteTypeBitmask::from(waste_type)
            })
    }

    pub fn excludes(self, waste_type: WasteType) -> bool {
        self.contains(WasteTypeBitmask::from(waste_type))
    }
}
