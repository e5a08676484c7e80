//! CSV export of report tables.

use std::path::Path;

use tracing::info;

use super::StorageError;
use crate::report::{Match, SeasonReport};

pub const MATCHES_HEADER: &str = "Date,Event,Opponent,Opponent-Team,Result,Outcome,Round,Weight-Class";
pub const SEASONS_HEADER: &str = "Season,Matches,Wins,Losses,Pins,Techs,Ratio";

/// Always-quoted field, with embedded quotes doubled.
fn quoted(value: Option<&str>) -> String {
    format!("\"{}\"", value.unwrap_or_default().replace('"', "\"\""))
}

/// Bare field, quoted only when it would break the row.
fn bare(value: Option<&str>) -> String {
    let value = value.unwrap_or_default();
    if value.contains([',', '"', '\n', '\r']) {
        quoted(Some(value))
    } else {
        value.to_string()
    }
}

fn match_row(m: &Match) -> String {
    let date = m
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let opponent = m.opponent.as_ref();
    let team = opponent.and_then(|o| o.team.as_ref());

    [
        date,
        quoted(m.event.name.as_deref()),
        quoted(opponent.and_then(|o| o.name.as_deref())),
        quoted(team.and_then(|t| t.name.as_deref())),
        quoted(m.result.as_deref()),
        if m.win { "W" } else { "L" }.to_string(),
        bare(m.round.as_deref()),
        bare(m.weight_class.as_deref()),
    ]
    .join(",")
}

/// Matches table, one row per bout.
pub fn export_matches<'a>(matches: impl IntoIterator<Item = &'a Match>) -> String {
    let rows: Vec<String> = matches.into_iter().map(match_row).collect();
    format!("{}\n{}", MATCHES_HEADER, rows.join("\n"))
}

/// Seasons table, one row per season.
pub fn export_seasons(seasons: &[SeasonReport]) -> String {
    let rows: Vec<String> = seasons
        .iter()
        .map(|season| {
            let stats = &season.stats.stats;
            format!(
                "{},{},{},{},{},{},{}",
                bare(Some(&season.name)),
                stats.matches,
                stats.wins,
                stats.losses,
                stats.pins,
                stats.techs,
                stats.ratio_display()
            )
        })
        .collect();
    format!("{}\n{}", SEASONS_HEADER, rows.join("\n"))
}

/// Write an export to `path`, creating parent directories.
pub fn write_export(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    info!("Wrote {}", path.display());
    Ok(())
}
