//! Academic-year seasons.
//!
//! A season runs from November 1st through October 31st and is named after
//! the two calendar years it spans, e.g. `2023-24`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::{AppearanceView, BoutView};

/// Month and day on which every season starts.
pub const SEASON_START_MONTH: u32 = 11;
pub const SEASON_START_DAY: u32 = 1;

/// The most recent November 1st at or before `date`.
pub fn season_start(date: NaiveDate) -> NaiveDate {
    let year = if date.month() >= SEASON_START_MONTH {
        date.year()
    } else {
        date.year() - 1
    };
    // Nov 1 exists in every year chrono can represent
    NaiveDate::from_ymd_opt(year, SEASON_START_MONTH, SEASON_START_DAY).unwrap_or(date)
}

/// Display name of the season starting in `start_year`.
pub fn season_name_for_year(start_year: i32) -> String {
    format!("{}-{:02}", start_year, (start_year + 1).rem_euclid(100))
}

/// Display name of the season containing `date`.
pub fn season_name(date: NaiveDate) -> String {
    season_name_for_year(season_start(date).year())
}

/// Bouts and appearances of one academic year.
#[derive(Debug, Clone)]
pub struct Season<'a> {
    pub name: String,
    pub boundary_start: NaiveDate,
    pub bouts: Vec<BoutView<'a>>,
    pub appearances: Vec<AppearanceView<'a>>,
}

impl<'a> Season<'a> {
    fn starting(boundary_start: NaiveDate) -> Self {
        Self {
            name: season_name_for_year(boundary_start.year()),
            boundary_start,
            bouts: Vec::new(),
            appearances: Vec::new(),
        }
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        season_start(date.date_naive()) == self.boundary_start
    }
}

/// Partition views into seasons.
///
/// Seasons come out in first-seen order over the bouts; sort by
/// `boundary_start` for chronology. Only bouts open a season, so every
/// season has at least one bout; appearances falling outside every bout
/// season are left out. Undated views are not segmented.
pub fn segment<'a>(
    bouts: &[BoutView<'a>],
    appearances: &[AppearanceView<'a>],
) -> Vec<Season<'a>> {
    let mut seasons: Vec<Season<'a>> = Vec::new();

    for bout in bouts {
        let Some(date) = bout.effective_date else {
            continue;
        };
        let start = season_start(date.date_naive());
        match seasons.iter_mut().find(|s| s.boundary_start == start) {
            Some(season) => season.bouts.push(*bout),
            None => {
                let mut season = Season::starting(start);
                season.bouts.push(*bout);
                seasons.push(season);
            }
        }
    }

    for appearance in appearances {
        let Some(date) = appearance.effective_date() else {
            continue;
        };
        if let Some(season) = seasons.iter_mut().find(|s| s.contains(date)) {
            season.appearances.push(*appearance);
        }
    }

    seasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, RecordType};
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bout_view(record: &Record, date: Option<DateTime<Utc>>) -> BoutView<'_> {
        BoutView {
            bout: record,
            event: None,
            weight_class: None,
            round_name: None,
            division: None,
            top_wrestler: None,
            bottom_wrestler: None,
            winner: None,
            opponent: None,
            opponent_team: None,
            this_wrestler: None,
            this_team: None,
            effective_date: date,
            is_win: false,
            has_no_opponent: false,
            no_opponent_reason: None,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_season_names() {
        assert_eq!(season_name(day(2023, 12, 5)), "2023-24");
        assert_eq!(season_name(day(2023, 9, 15)), "2022-23");
        assert_eq!(season_name(day(2024, 11, 1)), "2024-25");
        assert_eq!(season_name(day(2024, 10, 31)), "2023-24");
        assert_eq!(season_name(day(1999, 12, 1)), "1999-00");
    }

    #[test]
    fn test_season_start() {
        assert_eq!(season_start(day(2024, 3, 2)), day(2023, 11, 1));
        assert_eq!(season_start(day(2024, 11, 1)), day(2024, 11, 1));
    }

    #[test]
    fn test_segment_first_seen_order() {
        let records: Vec<Record> = (0..4)
            .map(|i| Record::new(RecordType::Bout, format!("b{}", i)))
            .collect();
        let views = vec![
            bout_view(&records[0], at(2024, 1, 10)),
            bout_view(&records[1], at(2022, 12, 1)),
            bout_view(&records[2], at(2023, 11, 20)),
            bout_view(&records[3], None),
        ];

        let seasons = segment(&views, &[]);

        let names: Vec<_> = seasons.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["2023-24", "2022-23"]);
        assert_eq!(seasons[0].bouts.len(), 2);
        assert_eq!(seasons[1].bouts.len(), 1);
    }

    #[test]
    fn test_segment_never_creates_bout_empty_seasons() {
        let bout = Record::new(RecordType::Bout, "b1");
        let appearance = Record::new(RecordType::Wrestler, "w1");
        let in_season =
            Record::new(RecordType::Event, "e1").with_attr("endDateTime", "2024-02-01T00:00:00Z");
        let other_season =
            Record::new(RecordType::Event, "e2").with_attr("endDateTime", "2021-02-01T00:00:00Z");

        let appearances = vec![
            AppearanceView {
                appearance: &appearance,
                event: Some(&in_season),
                weight_class: None,
                division: None,
                team: None,
                grade: None,
                placement: None,
            },
            AppearanceView {
                appearance: &appearance,
                event: Some(&other_season),
                weight_class: None,
                division: None,
                team: None,
                grade: None,
                placement: None,
            },
        ];

        let seasons = segment(&[bout_view(&bout, at(2024, 1, 5))], &appearances);

        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].appearances.len(), 1);
        assert!(segment(&[], &appearances).is_empty());
    }
}
