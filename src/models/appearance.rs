//! The denormalized wrestler-appearance view and placements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// Display text for an appearance with no bracket placement.
pub const DID_NOT_PLACE: &str = "DNP";

/// Coarse classification of a finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTier {
    Champion,
    RunnerUp,
    Third,
    /// Dual meets have no brackets
    Dual,
    Other,
}

impl PlacementTier {
    pub fn classify(placement: Option<i64>, is_dual: bool) -> Self {
        match placement {
            Some(1) => PlacementTier::Champion,
            Some(2) => PlacementTier::RunnerUp,
            Some(3) => PlacementTier::Third,
            _ if is_dual => PlacementTier::Dual,
            _ => PlacementTier::Other,
        }
    }
}

/// One wrestler-appearance record joined with its event, weight class,
/// division, team, grade and bracket placement.
#[derive(Debug, Clone, Copy)]
pub struct AppearanceView<'a> {
    pub appearance: &'a Record,
    pub event: Option<&'a Record>,
    pub weight_class: Option<&'a Record>,
    pub division: Option<&'a Record>,
    pub team: Option<&'a Record>,
    pub grade: Option<&'a Record>,
    /// First placement in source order.
    pub placement: Option<&'a Record>,
}

impl<'a> AppearanceView<'a> {
    /// Event end date, falling back to its start date.
    pub fn effective_date(&self) -> Option<DateTime<Utc>> {
        let event = self.event?;
        event
            .datetime_attr("endDateTime")
            .or_else(|| event.datetime_attr("startDateTime"))
    }

    pub fn is_dual(&self) -> bool {
        self.event
            .and_then(|e| e.bool_attr("isDual"))
            .unwrap_or(false)
    }

    pub fn team_identity(&self) -> Option<&'a str> {
        self.team.map(Record::team_identity)
    }

    pub fn placement_rank(&self) -> Option<i64> {
        self.placement.and_then(|p| p.i64_attr("placement"))
    }

    pub fn placement_display(&self) -> &'a str {
        self.placement
            .and_then(|p| p.str_attr("placementDisplay"))
            .unwrap_or(DID_NOT_PLACE)
    }

    pub fn placement_tier(&self) -> PlacementTier {
        PlacementTier::classify(self.placement_rank(), self.is_dual())
    }

    /// Grade name from the grade record, else the embedded grade object.
    pub fn grade_name(&self) -> Option<&'a str> {
        self.grade
            .and_then(|g| g.str_attr("name"))
            .or_else(|| self.appearance.nested_str("grade", "name"))
    }

    pub fn full_name(&self) -> Option<String> {
        self.appearance.person_name()
    }
}
