//! Bout outcomes and the denormalized bout view.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Record;

/// How a bout was decided, from the `winType` code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WinType {
    /// Fall (pin)
    Fall,
    TechFall,
    MajorDecision,
    Decision,
    Forfeit,
    Bye,
    Disqualification,
    InjuryDefault,
    SuddenVictory,
    /// No code recorded
    Unknown,
    Other(String),
}

impl WinType {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            None | Some("") | Some("UNK") => WinType::Unknown,
            Some("F") => WinType::Fall,
            Some("TF") => WinType::TechFall,
            Some("MD") => WinType::MajorDecision,
            Some("DEC") => WinType::Decision,
            Some("FOR") => WinType::Forfeit,
            Some("BYE") => WinType::Bye,
            Some("DQ") => WinType::Disqualification,
            Some("INJ") => WinType::InjuryDefault,
            Some("SV") => WinType::SuddenVictory,
            Some(other) => WinType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            WinType::Fall => "F",
            WinType::TechFall => "TF",
            WinType::MajorDecision => "MD",
            WinType::Decision => "DEC",
            WinType::Forfeit => "FOR",
            WinType::Bye => "BYE",
            WinType::Disqualification => "DQ",
            WinType::InjuryDefault => "INJ",
            WinType::SuddenVictory => "SV",
            WinType::Unknown => "UNK",
            WinType::Other(code) => code,
        }
    }

    /// Why there was no opponent, if the code implies none.
    pub fn no_opponent_reason(&self) -> Option<NoOpponentReason> {
        match self {
            WinType::Forfeit => Some(NoOpponentReason::Forfeit),
            WinType::Bye => Some(NoOpponentReason::Bye),
            _ => None,
        }
    }
}

impl From<String> for WinType {
    fn from(s: String) -> Self {
        WinType::from_code(Some(&s))
    }
}

impl From<WinType> for String {
    fn from(w: WinType) -> Self {
        w.code().to_string()
    }
}

impl fmt::Display for WinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoOpponentReason {
    Forfeit,
    Bye,
}

fn bout_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d*):(\d{2})").expect("static bout time pattern"))
}

/// Elapsed bout time, ordered by minutes then seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoutTime {
    pub minutes: u32,
    pub seconds: u32,
}

impl BoutTime {
    /// Find an `M:SS` time in a free-text result such as `"F 1:30"`.
    /// Minutes may be omitted (`":45"` is 0:45).
    pub fn parse(text: &str) -> Option<Self> {
        let caps = bout_time_pattern().captures(text)?;
        let minutes = match caps.get(1).map(|m| m.as_str()) {
            None | Some("") => 0,
            Some(m) => m.parse().ok()?,
        };
        let seconds = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { minutes, seconds })
    }
}

impl fmt::Display for BoutTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

/// Data problems noticed while joining a bout. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAnomaly {
    /// Neither side of the bout belongs to the athlete.
    AthleteNotInBout,
    MissingTeam,
    MissingDivision,
}

impl fmt::Display for JoinAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinAnomaly::AthleteNotInBout => write!(f, "athlete not found on either side"),
            JoinAnomaly::MissingTeam => write!(f, "team could not be resolved"),
            JoinAnomaly::MissingDivision => write!(f, "division could not be resolved"),
        }
    }
}

/// One bout joined with everything it references, from one athlete's side.
///
/// Borrowed from the bundle it was built from; rebuilt whenever the bundle
/// or the athlete changes.
#[derive(Debug, Clone, Copy)]
pub struct BoutView<'a> {
    pub bout: &'a Record,
    pub event: Option<&'a Record>,
    pub weight_class: Option<&'a Record>,
    pub round_name: Option<&'a Record>,
    pub division: Option<&'a Record>,
    pub top_wrestler: Option<&'a Record>,
    pub bottom_wrestler: Option<&'a Record>,
    pub winner: Option<&'a Record>,
    pub opponent: Option<&'a Record>,
    pub opponent_team: Option<&'a Record>,
    pub this_wrestler: Option<&'a Record>,
    pub this_team: Option<&'a Record>,
    pub effective_date: Option<DateTime<Utc>>,
    pub is_win: bool,
    pub has_no_opponent: bool,
    pub no_opponent_reason: Option<NoOpponentReason>,
}

impl<'a> BoutView<'a> {
    pub fn win_type(&self) -> WinType {
        WinType::from_code(self.bout.str_attr("winType"))
    }

    /// Free-text result, e.g. `"F 1:30"` or `"Dec 5-2"`.
    pub fn result(&self) -> Option<&'a str> {
        self.bout.str_attr("result")
    }

    /// Whether the parent event is a dual meet. Unknown events count as
    /// tournaments.
    pub fn is_dual(&self) -> bool {
        self.event
            .and_then(|e| e.bool_attr("isDual"))
            .unwrap_or(false)
    }

    pub fn this_team_identity(&self) -> Option<&'a str> {
        self.this_team.map(Record::team_identity)
    }

    /// Elapsed time parsed from the result text.
    pub fn duration(&self) -> Option<BoutTime> {
        self.result().and_then(BoutTime::parse)
    }

    pub fn anomalies(&self) -> Vec<JoinAnomaly> {
        let mut found = Vec::new();
        if self.this_wrestler.is_none() {
            found.push(JoinAnomaly::AthleteNotInBout);
        } else {
            if self.this_team.is_none() {
                found.push(JoinAnomaly::MissingTeam);
            }
            if self.division.is_none() {
                found.push(JoinAnomaly::MissingDivision);
            }
        }
        found
    }
}
