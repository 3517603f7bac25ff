//! Station roster derived from stored readings

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Group label used for stations without one
pub const UNGROUPED: &str = "Khác";

/// A station and the group it reports to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationMetadata {
    pub station: String,
    pub group: Option<String>,
}

impl StationMetadata {
    pub fn new(station: impl Into<String>, group: Option<&str>) -> Self {
        Self {
            station: station.into(),
            group: group.map(str::to_string),
        }
    }

    /// Group name, falling back to [`UNGROUPED`]
    pub fn group_or_default(&self) -> &str {
        self.group
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(UNGROUPED)
    }
}

/// Build the roster from observed (station, group) pairs: distinct, sorted by
/// station name, rows without a station name dropped
pub fn roster_from_pairs<I>(pairs: I) -> Vec<StationMetadata>
where
    I: IntoIterator<Item = (Option<String>, Option<String>)>,
{
    let distinct: BTreeSet<StationMetadata> = pairs
        .into_iter()
        .filter_map(|(station, group)| {
            let station = station?.trim().to_string();
            if station.is_empty() {
                return None;
            }
            let group = group
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty());
            Some(StationMetadata { station, group })
        })
        .collect();
    distinct.into_iter().collect()
}

/// Distinct, sorted, non-empty group names
pub fn groups(roster: &[StationMetadata]) -> Vec<String> {
    roster
        .iter()
        .filter_map(|m| m.group.clone())
        .filter(|g| !g.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Stations reporting to `group`, sorted by name
pub fn stations_in_group(roster: &[StationMetadata], group: &str) -> Vec<StationMetadata> {
    let mut stations: Vec<StationMetadata> = roster
        .iter()
        .filter(|m| m.group.as_deref() == Some(group))
        .cloned()
        .collect();
    stations.sort();
    stations
}
