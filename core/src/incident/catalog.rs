//! Response teams, evacuation zones, and the keyword rules that pick teams
//! for a new incident.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamKey {
    #[serde(rename = "waterRescue")]
    WaterRescue,
    #[serde(rename = "hazmat")]
    Hazmat,
    #[serde(rename = "medical")]
    Medical,
}

#[derive(Debug)]
pub struct TeamProfile {
    pub name: &'static str,
    pub members: u32,
    pub equipment: &'static [&'static str],
    pub response_minutes: i64,
    pub coverage: &'static str,
}

static WATER_RESCUE: TeamProfile = TeamProfile {
    name: "Water Rescue Team",
    members: 12,
    equipment: &["Rescue Boats", "Diving Equipment", "Life Jackets"],
    response_minutes: 15,
    coverage: "Coastal Zone A-C",
};

static HAZMAT: TeamProfile = TeamProfile {
    name: "Hazardous Materials Team",
    members: 8,
    equipment: &["Chemical Detection", "Containment Gear", "Decontamination Unit"],
    response_minutes: 30,
    coverage: "All Zones",
};

static MEDICAL: TeamProfile = TeamProfile {
    name: "Emergency Medical Team",
    members: 15,
    equipment: &["Mobile Medical Unit", "Trauma Supplies", "Defibrillators"],
    response_minutes: 10,
    coverage: "All Zones",
};

impl TeamKey {
    pub const ALL: [TeamKey; 3] = [TeamKey::WaterRescue, TeamKey::Hazmat, TeamKey::Medical];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamKey::WaterRescue => "waterRescue",
            TeamKey::Hazmat => "hazmat",
            TeamKey::Medical => "medical",
        }
    }

    pub fn profile(&self) -> &'static TeamProfile {
        match self {
            TeamKey::WaterRescue => &WATER_RESCUE,
            TeamKey::Hazmat => &HAZMAT,
            TeamKey::Medical => &MEDICAL,
        }
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `waterRescue`, `water_rescue`, `water-rescue` and friends.
impl FromStr for TeamKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "waterrescue" => Ok(TeamKey::WaterRescue),
            "hazmat" => Ok(TeamKey::Hazmat),
            "medical" => Ok(TeamKey::Medical),
            _ => Err(CoreError::UnknownTeam(s.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct ZoneProfile {
    pub key: &'static str,
    pub name: &'static str,
    pub population: u64,
    pub shelters: &'static [&'static str],
    pub evacuation_minutes: i64,
    pub routes: &'static [&'static str],
}

pub static ZONES: [ZoneProfile; 3] = [
    ZoneProfile {
        key: "zoneA",
        name: "Immediate Coastal Zone",
        population: 1200,
        shelters: &["Community Center A", "High School Gymnasium"],
        evacuation_minutes: 15,
        routes: &["Highway 101 North", "Coastal Road East"],
    },
    ZoneProfile {
        key: "zoneB",
        name: "Low-lying Areas",
        population: 3500,
        shelters: &["City Hall", "Recreation Center", "Middle School"],
        evacuation_minutes: 30,
        routes: &["Main Street", "Industrial Blvd", "Highway 101"],
    },
    ZoneProfile {
        key: "zoneC",
        name: "River Delta Region",
        population: 800,
        shelters: &["Fire Station 3", "Community Church"],
        evacuation_minutes: 20,
        routes: &["River Road", "Delta Highway"],
    },
];

pub fn zone(key: &str) -> Option<&'static ZoneProfile> {
    ZONES.iter().find(|z| z.key == key)
}

/// Lower-cases and maps `-`/`_` to spaces so `Storm_Surge` matches `storm surge`.
pub fn normalize_incident_type(incident_type: &str) -> String {
    incident_type
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

const ASSIGNMENT_RULES: [(&[&str], &[TeamKey]); 3] = [
    (
        &["contamination", "dumping"],
        &[TeamKey::Hazmat, TeamKey::Medical],
    ),
    (
        &["storm surge", "tsunami"],
        &[TeamKey::WaterRescue, TeamKey::Medical],
    ),
    (&["algal bloom"], &[TeamKey::Hazmat]),
];

/// Teams dispatched automatically for a new incident of this type.
pub fn teams_for_incident_type(incident_type: &str) -> Vec<TeamKey> {
    let normalized = normalize_incident_type(incident_type);
    ASSIGNMENT_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(_, teams)| teams.to_vec())
        .unwrap_or_else(|| vec![TeamKey::Medical])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_keys_parse_loosely() {
        assert_eq!("waterRescue".parse::<TeamKey>().unwrap(), TeamKey::WaterRescue);
        assert_eq!("water_rescue".parse::<TeamKey>().unwrap(), TeamKey::WaterRescue);
        assert_eq!("HAZMAT".parse::<TeamKey>().unwrap(), TeamKey::Hazmat);
        assert!(matches!(
            "bomb squad".parse::<TeamKey>(),
            Err(CoreError::UnknownTeam(_))
        ));
    }

    #[test]
    fn assignment_follows_keywords() {
        assert_eq!(
            teams_for_incident_type("Illegal Dumping Detected"),
            vec![TeamKey::Hazmat, TeamKey::Medical]
        );
        assert_eq!(
            teams_for_incident_type("storm-surge"),
            vec![TeamKey::WaterRescue, TeamKey::Medical]
        );
        assert_eq!(teams_for_incident_type("Algal_Bloom"), vec![TeamKey::Hazmat]);
        assert_eq!(teams_for_incident_type("Rip Current"), vec![TeamKey::Medical]);
    }

    #[test]
    fn zones_have_populations() {
        let total: u64 = ["zoneA", "zoneB"].iter().filter_map(|k| zone(k)).map(|z| z.population).sum();
        assert_eq!(total, 4700);
        assert!(zone("zoneZ").is_none());
    }

    #[test]
    fn team_serializes_camel_case() {
        assert_eq!(serde_json::to_string(&TeamKey::WaterRescue).unwrap(), "\"waterRescue\"");
    }
}
