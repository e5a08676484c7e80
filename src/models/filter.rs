//! User-selected filter state.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{AthleteId, CacheKey};

/// Which bouts and appearances feed the aggregation.
///
/// Duals and tournaments can never both be excluded: switching one off
/// switches the other on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFilterState")]
pub struct FilterState {
    /// Inclusive first calendar day.
    pub start_date: Option<NaiveDate>,

    /// Inclusive last calendar day.
    pub end_date: Option<NaiveDate>,

    include_duals: bool,

    include_tournaments: bool,

    pub include_byes: bool,

    pub include_forfeits: bool,

    /// Team identities whose bouts and appearances are hidden.
    pub ignored_teams: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawFilterState {
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    include_duals: bool,
    #[serde(default = "default_true")]
    include_tournaments: bool,
    #[serde(default = "default_true")]
    include_byes: bool,
    #[serde(default = "default_true")]
    include_forfeits: bool,
    #[serde(default)]
    ignored_teams: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

impl From<RawFilterState> for FilterState {
    fn from(raw: RawFilterState) -> Self {
        let mut state = FilterState {
            start_date: raw.start_date,
            end_date: raw.end_date,
            include_duals: true,
            include_tournaments: true,
            include_byes: raw.include_byes,
            include_forfeits: raw.include_forfeits,
            ignored_teams: raw.ignored_teams,
        };
        state.set_include_tournaments(raw.include_tournaments);
        state.set_include_duals(raw.include_duals);
        state
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            include_duals: true,
            include_tournaments: true,
            include_byes: true,
            include_forfeits: true,
            ignored_teams: BTreeSet::new(),
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_duals(&self) -> bool {
        self.include_duals
    }

    pub fn include_tournaments(&self) -> bool {
        self.include_tournaments
    }

    /// Toggle duals; turning them off forces tournaments on.
    pub fn set_include_duals(&mut self, include: bool) {
        self.include_duals = include;
        if !include {
            self.include_tournaments = true;
        }
    }

    /// Toggle tournaments; turning them off forces duals on.
    pub fn set_include_tournaments(&mut self, include: bool) {
        self.include_tournaments = include;
        if !include {
            self.include_duals = true;
        }
    }

    /// Builder method to set the date window.
    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Builder method to hide a team.
    pub fn with_ignored_team(mut self, identity: impl Into<String>) -> Self {
        self.ignored_teams.insert(identity.into());
        self
    }

    /// Whether a date passes the window. Undated records fail any active
    /// bound.
    pub fn contains_date(&self, date: Option<DateTime<Utc>>) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        let Some(day) = date.map(|d| d.date_naive()) else {
            return false;
        };
        if self.start_date.is_some_and(|start| day < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| day > end) {
            return false;
        }
        true
    }

    /// Whether an event of the given kind passes the event-type toggles.
    pub fn allows_event(&self, is_dual: bool) -> bool {
        if is_dual {
            self.include_duals
        } else {
            self.include_tournaments
        }
    }

    pub fn is_team_ignored(&self, identity: Option<&str>) -> bool {
        identity.is_some_and(|id| self.ignored_teams.contains(id))
    }

    /// Memoization key for reports computed under this filter.
    pub fn cache_key(&self, athlete: &AthleteId) -> CacheKey {
        let encoded = serde_json::to_string(self).unwrap_or_default();
        CacheKey::generate(&[athlete.as_str(), &encoded])
    }
}
