//! Statistics calculation engine.
//!
//! Computes derived metrics from joined views:
//! - Win/loss totals, pins, techs and the reduced win/loss ratio
//! - Finish-type histogram and quickest win/loss by fall
//! - Matches per team the athlete wrestled for
//! - Bout date window and weight history

mod filter;

pub use filter::*;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AppearanceView, BoutView, FinishTally, Quickest, Record, Stats, WinType};

/// Greatest common divisor.
fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Reduce a wins:losses pair by its gcd.
///
/// A zero on either side is kept as is: `(0, 5)` stays `[0, 5]` and
/// `(4, 0)` stays `[4, 0]`.
pub fn reduce_ratio(wins: u32, losses: u32) -> [u32; 2] {
    if wins == 0 {
        return [0, losses];
    }
    if losses == 0 {
        return [wins, 0];
    }
    let divisor = gcd(wins, losses);
    [wins / divisor, losses / divisor]
}

/// Compute statistics over bouts in input order.
///
/// Quickest win/loss only consider falls with a parseable time; a later
/// bout replaces the current value only when strictly faster.
pub fn compute_stats(bouts: &[BoutView<'_>]) -> Stats {
    let mut stats = Stats::default();

    for view in bouts {
        let win_type = view.win_type();
        stats.matches += 1;

        if view.is_win {
            stats.wins += 1;
            match win_type {
                WinType::Fall => stats.pins += 1,
                WinType::TechFall => stats.techs += 1,
                _ => {}
            }
        } else {
            stats.losses += 1;
        }

        match stats.finish_types.iter_mut().find(|f| f.win_type == win_type) {
            Some(tally) => {
                tally.wins += u32::from(view.is_win);
                tally.losses += u32::from(!view.is_win);
            }
            None => stats.finish_types.push(FinishTally {
                win_type: win_type.clone(),
                wins: u32::from(view.is_win),
                losses: u32::from(!view.is_win),
            }),
        }

        if win_type != WinType::Fall {
            continue;
        }
        let Some(time) = view.duration() else {
            continue;
        };
        let slot = if view.is_win {
            &mut stats.quickest_win
        } else {
            &mut stats.quickest_loss
        };
        if slot.as_ref().map_or(true, |current| time < current.time) {
            *slot = Some(Quickest {
                time,
                bout_id: view.bout.id.clone(),
            });
        }
    }

    stats.win_loss_ratio = reduce_ratio(stats.wins, stats.losses);
    stats
}

/// Bouts counted for one team the athlete wrestled for.
#[derive(Debug, Clone)]
pub struct TeamMatches<'a> {
    /// First team record seen with this identity.
    pub team: &'a Record,
    pub identity: &'a str,
    pub matches: u32,
}

/// Count bouts per distinct team identity the athlete appeared for.
///
/// Teams come out in first-seen order over the appearances.
pub fn compute_team_matches<'a>(
    appearances: &[AppearanceView<'a>],
    bouts: &[BoutView<'a>],
) -> Vec<TeamMatches<'a>> {
    let mut teams: Vec<TeamMatches<'a>> = Vec::new();

    for team in appearances.iter().filter_map(|a| a.team) {
        let identity = team.team_identity();
        if teams.iter().any(|t| t.identity == identity) {
            continue;
        }
        let matches = bouts
            .iter()
            .filter(|b| b.this_team_identity() == Some(identity))
            .count() as u32;
        teams.push(TeamMatches {
            team,
            identity,
            matches,
        });
    }

    teams
}

/// Oldest and newest bout dates, ignoring undated bouts.
pub fn bout_window(bouts: &[BoutView<'_>]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut dates = bouts.iter().filter_map(|b| b.effective_date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(oldest, newest), d| {
        (oldest.min(d), newest.max(d))
    }))
}

/// Sort appearances newest first by event date. Undated appearances go last.
pub fn sort_newest_first(appearances: &mut [AppearanceView<'_>]) {
    appearances.sort_by(|a, b| match (a.effective_date(), b.effective_date()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// One weigh-in on the weight chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightPoint {
    pub date: DateTime<Utc>,
    pub event: Option<String>,
    pub weight_class_max: Option<f64>,
    pub exact_weight: Option<f64>,
}

/// Weight-class maximum and exact weight per event start date.
///
/// Appearances without a weight class or a dated event are skipped; a later
/// appearance on the same date replaces the earlier point.
pub fn weight_history(appearances: &[AppearanceView<'_>]) -> Vec<WeightPoint> {
    let mut points: BTreeMap<DateTime<Utc>, WeightPoint> = BTreeMap::new();

    for view in appearances {
        let (Some(event), Some(weight_class)) = (view.event, view.weight_class) else {
            continue;
        };
        let Some(date) = event.datetime_attr("startDateTime") else {
            continue;
        };
        points.insert(
            date,
            WeightPoint {
                date,
                event: event.str_attr("name").map(str::to_string),
                weight_class_max: weight_class.f64_attr("maxWeight"),
                exact_weight: view.appearance.f64_attr("exactWeight"),
            },
        );
    }

    points.into_values().collect()
}
