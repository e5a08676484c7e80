//! Derived statistics models.

use serde::{Deserialize, Serialize};

use super::{BoutTime, RecordId, WinType};

/// Wins and losses for one finish type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishTally {
    pub win_type: WinType,
    pub wins: u32,
    pub losses: u32,
}

/// An extremal bout time and the bout it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quickest {
    pub time: BoutTime,
    pub bout_id: RecordId,
}

/// Statistics over one collection of bouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub matches: u32,
    pub wins: u32,
    pub losses: u32,

    /// Wins by fall
    pub pins: u32,

    /// Wins by technical fall
    pub techs: u32,

    /// Wins to losses, reduced by their gcd
    pub win_loss_ratio: [u32; 2],

    /// Finish types in order of first appearance
    pub finish_types: Vec<FinishTally>,

    pub quickest_win: Option<Quickest>,
    pub quickest_loss: Option<Quickest>,
}

impl Stats {
    /// Share of matches won, or `None` when there are no matches.
    pub fn win_percentage(&self) -> Option<f64> {
        if self.matches == 0 {
            None
        } else {
            Some(self.wins as f64 / self.matches as f64)
        }
    }

    pub fn has_data(&self) -> bool {
        self.matches > 0
    }

    /// `wins:losses` as shown in tables and CSV.
    pub fn ratio_display(&self) -> String {
        format!("{}:{}", self.win_loss_ratio[0], self.win_loss_ratio[1])
    }

    pub fn finish(&self, win_type: &WinType) -> Option<&FinishTally> {
        self.finish_types.iter().find(|f| &f.win_type == win_type)
    }
}
