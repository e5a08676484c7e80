//! Athlete reports.
//!
//! Runs the full pipeline (join, filter, segment, aggregate) over a loaded
//! athlete's bundles and produces owned, serializable rows for the CLI,
//! the HTTP API and CSV export.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculate::{
    apply_filters, bout_window, compute_stats, compute_team_matches, sort_newest_first,
    weight_history, WeightPoint,
};
use crate::join::{join_appearances, join_bouts};
use crate::models::{
    season_start, segment, AppearanceView, AthleteId, BoutView, Bundle, CacheKey, FilterState,
    NoOpponentReason, PlacementTier, Record, Season, Stats, WinType,
};

/// An event reference on a match row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentTeam {
    pub name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opponent {
    /// Cross-event identity when known, else the appearance record id
    pub id: String,
    pub name: Option<String>,
    pub team: Option<OpponentTeam>,
}

/// One row of the matches table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub event: EventRef,
    pub date: Option<DateTime<Utc>>,
    /// `None` for byes, forfeits and unresolvable opponents
    pub opponent: Option<Opponent>,
    pub weight_class: Option<String>,
    pub division: Option<String>,
    pub round: Option<String>,
    pub result: Option<String>,
    pub win_type: WinType,
    pub win: bool,
    pub no_opponent_reason: Option<NoOpponentReason>,
}

impl Match {
    fn from_view(view: &BoutView<'_>) -> Self {
        let opponent = view.opponent.map(|o| Opponent {
            id: o
                .identity_person_id()
                .map(str::to_string)
                .unwrap_or_else(|| o.id.to_string()),
            name: o.person_name(),
            team: view.opponent_team.map(|t| OpponentTeam {
                name: owned(t, "name"),
                state: owned(t, "state"),
            }),
        });

        Self {
            id: view.bout.id.to_string(),
            event: EventRef {
                id: view.event.map(|e| e.id.to_string()),
                name: view.event.and_then(|e| owned(e, "name")),
            },
            date: view.effective_date,
            opponent,
            weight_class: view.weight_class.and_then(|w| owned(w, "name")),
            division: view.division.and_then(|d| owned(d, "name")),
            round: view.round_name.and_then(|r| owned(r, "displayName")),
            result: view.result().map(str::to_string),
            win_type: view.win_type(),
            win: view.is_win,
            no_opponent_reason: view.no_opponent_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// One appearance's finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementInfo {
    /// Display text, `DNP` when unplaced
    pub placement: String,
    pub rank: Option<i64>,
    pub tier: PlacementTier,
    pub event: PlacementEvent,
    pub division: Option<String>,
    pub weight_class: Option<String>,
}

impl PlacementInfo {
    fn from_view(view: &AppearanceView<'_>) -> Self {
        let weight_class = view.weight_class.and_then(|w| owned(w, "name")).map(|name| {
            match view.division.and_then(|d| d.str_attr("measurementUnit")) {
                Some(unit) => format!("{} {}", name, unit),
                None => name,
            }
        });

        Self {
            placement: view.placement_display().to_string(),
            rank: view.placement_rank(),
            tier: view.placement_tier(),
            event: PlacementEvent {
                id: view.event.map(|e| e.id.to_string()),
                name: view.event.and_then(|e| owned(e, "name")),
                date: view.effective_date(),
            },
            division: view.division.and_then(|d| owned(d, "name")),
            weight_class,
        }
    }
}

/// Stats plus the derived win percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: Stats,
    pub win_percentage: Option<f64>,
}

impl From<Stats> for StatsReport {
    fn from(stats: Stats) -> Self {
        let win_percentage = stats.win_percentage();
        Self {
            stats,
            win_percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonReport {
    pub name: String,
    pub boundary_start: NaiveDate,
    pub stats: StatsReport,
    pub placements: Vec<PlacementInfo>,
    pub matches: Vec<Match>,
    /// Grade of the first appearance in the season that carries one
    pub grade: Option<String>,
}

impl SeasonReport {
    fn from_season(season: &Season<'_>) -> Self {
        Self {
            name: season.name.clone(),
            boundary_start: season.boundary_start,
            stats: compute_stats(&season.bouts).into(),
            placements: season.appearances.iter().map(PlacementInfo::from_view).collect(),
            matches: season.bouts.iter().map(Match::from_view).collect(),
            grade: season
                .appearances
                .iter()
                .find_map(|a| a.grade_name())
                .map(str::to_string),
        }
    }
}

/// A team the athlete wrestled for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamReport {
    pub identity: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub matches: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: AthleteId,
    /// Name on the newest appearance
    pub name: Option<String>,
    pub grade: Option<String>,
    pub team: Option<String>,
    pub date_of_birth: Option<String>,
    pub location: Option<String>,
    pub oldest_year: Option<i32>,
    pub newest_year: Option<i32>,
}

impl Profile {
    /// Build from appearances sorted newest first.
    fn from_appearances(athlete: &AthleteId, appearances: &[AppearanceView<'_>]) -> Self {
        let attr = |key: &str| {
            appearances
                .iter()
                .find_map(|a| a.appearance.str_attr(key))
                .map(str::to_string)
        };
        let years: Vec<i32> = appearances
            .iter()
            .filter_map(|a| a.effective_date())
            .map(|d| season_start(d.date_naive()).year())
            .collect();

        Self {
            id: athlete.clone(),
            name: appearances.first().and_then(AppearanceView::full_name),
            grade: appearances
                .iter()
                .find_map(|a| a.grade_name())
                .map(str::to_string),
            team: appearances
                .iter()
                .find_map(|a| a.team)
                .and_then(|t| owned(t, "name")),
            date_of_birth: attr("dateOfBirth"),
            location: appearances.iter().find_map(|a| location_of(a.appearance)),
            oldest_year: years.iter().copied().min(),
            newest_year: years.iter().copied().max(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoutWindow {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
}

/// Everything shown for one athlete under one filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteReport {
    pub profile: Profile,
    pub filter: FilterState,
    /// Dates of the oldest and newest bout, before filtering
    pub bout_window: Option<BoutWindow>,
    pub totals: StatsReport,
    /// Newest season first
    pub seasons: Vec<SeasonReport>,
    pub teams: Vec<TeamReport>,
    pub placements: Vec<PlacementInfo>,
    pub weight_history: Vec<WeightPoint>,
}

impl AthleteReport {
    /// Every match of every season, newest season first.
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.seasons.iter().flat_map(|s| s.matches.iter())
    }
}

fn owned(record: &Record, key: &str) -> Option<String> {
    record.str_attr(key).map(str::to_string)
}

fn location_of(record: &Record) -> Option<String> {
    if let Some(name) = record.nested_str("location", "name") {
        return Some(name.to_string());
    }
    let parts: Vec<&str> = ["city", "state", "country"]
        .iter()
        .filter_map(|k| record.nested_str("location", k))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn log_anomalies(bouts: &[BoutView<'_>]) {
    for view in bouts {
        for anomaly in view.anomalies() {
            warn!(bout = %view.bout.id, "Join anomaly: {}", anomaly);
        }
    }
}

/// Build the report for `athlete` from its appearance and bout bundles.
pub fn build_report(
    athlete: &AthleteId,
    appearances: &Bundle,
    bouts: &Bundle,
    filter: &FilterState,
) -> AthleteReport {
    let mut appearance_views = join_appearances(appearances);
    sort_newest_first(&mut appearance_views);

    let bout_views = join_bouts(bouts, athlete);
    log_anomalies(&bout_views);

    let filtered = apply_filters(appearances, &bout_views, &appearance_views, filter);

    let mut seasons = segment(&filtered.bouts, &filtered.appearances);
    seasons.sort_by(|a, b| b.boundary_start.cmp(&a.boundary_start));

    let teams = compute_team_matches(&appearance_views, &bout_views)
        .into_iter()
        .map(|t| TeamReport {
            identity: t.identity.to_string(),
            name: owned(t.team, "name"),
            location: t.team.nested_str("location", "name").map(str::to_string),
            matches: t.matches,
        })
        .collect();

    debug!(
        athlete = %athlete,
        bouts = filtered.bouts.len(),
        appearances = filtered.appearances.len(),
        seasons = seasons.len(),
        "Built athlete report"
    );

    AthleteReport {
        profile: Profile::from_appearances(athlete, &appearance_views),
        filter: filter.clone(),
        bout_window: bout_window(&bout_views).map(|(oldest, newest)| BoutWindow { oldest, newest }),
        totals: compute_stats(&filtered.bouts).into(),
        seasons: seasons.iter().map(SeasonReport::from_season).collect(),
        teams,
        placements: filtered
            .appearances
            .iter()
            .map(PlacementInfo::from_view)
            .collect(),
        weight_history: weight_history(&filtered.appearances),
    }
}

/// Memoized reports for one load of one athlete, keyed by
/// [`FilterState::cache_key`].
///
/// Entries are immutable; a different athlete or load generation drops
/// them all.
#[derive(Debug, Default)]
pub struct ReportCache {
    loaded: Option<(AthleteId, u64)>,
    entries: HashMap<CacheKey, Arc<AthleteReport>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        athlete: &AthleteId,
        generation: u64,
        appearances: &Bundle,
        bouts: &Bundle,
        filter: &FilterState,
    ) -> Arc<AthleteReport> {
        let is_same_load = self
            .loaded
            .as_ref()
            .is_some_and(|(a, g)| a == athlete && *g == generation);
        if !is_same_load {
            self.entries.clear();
            self.loaded = Some((athlete.clone(), generation));
        }
        let key = filter.cache_key(athlete);
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(build_report(athlete, appearances, bouts, filter)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
