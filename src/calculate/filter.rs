//! Filter engine.

use crate::models::{AppearanceView, BoutView, Bundle, FilterState, Record, RecordType, WinType};

/// Views that passed a [`FilterState`].
#[derive(Debug, Clone)]
pub struct FilteredViews<'a> {
    pub bouts: Vec<BoutView<'a>>,
    pub appearances: Vec<AppearanceView<'a>>,
    /// The appearance bundle's side-table minus bracket placements of
    /// excluded event types.
    pub included: Vec<&'a Record>,
}

/// Whether a bout passes every active predicate.
pub fn bout_passes(view: &BoutView<'_>, filter: &FilterState) -> bool {
    if !filter.contains_date(view.effective_date) {
        return false;
    }
    match view.win_type() {
        WinType::Bye if !filter.include_byes => return false,
        WinType::Forfeit if !filter.include_forfeits => return false,
        _ => {}
    }
    filter.allows_event(view.is_dual()) && !filter.is_team_ignored(view.this_team_identity())
}

/// Whether an appearance passes the date, event-type and team predicates.
pub fn appearance_passes(view: &AppearanceView<'_>, filter: &FilterState) -> bool {
    filter.contains_date(view.effective_date())
        && filter.allows_event(view.is_dual())
        && !filter.is_team_ignored(view.team_identity())
}

fn included_passes(record: &Record, bundle: &Bundle, filter: &FilterState) -> bool {
    if record.kind != RecordType::BracketPlacement {
        return true;
    }
    let is_dual = bundle
        .resolve(&RecordType::Event, record.related_id("eventId", "event").as_ref())
        .and_then(|e| e.bool_attr("isDual"))
        .unwrap_or(false);
    filter.allows_event(is_dual)
}

/// Apply `filter` to joined views.
///
/// `bundle` is the appearance bundle whose side-table is narrowed. Kept
/// appearances lose a placement that is no longer in the narrowed table.
/// Pure: applying the same filter again to the output changes nothing.
pub fn apply_filters<'a>(
    bundle: &'a Bundle,
    bouts: &[BoutView<'a>],
    appearances: &[AppearanceView<'a>],
    filter: &FilterState,
) -> FilteredViews<'a> {
    let included: Vec<&'a Record> = bundle
        .included
        .iter()
        .filter(|r| included_passes(r, bundle, filter))
        .collect();

    let appearances = appearances
        .iter()
        .filter(|a| appearance_passes(a, filter))
        .map(|a| AppearanceView {
            placement: a
                .placement
                .filter(|p| included.iter().any(|r| std::ptr::eq(*r, *p))),
            ..*a
        })
        .collect();

    FilteredViews {
        bouts: bouts
            .iter()
            .filter(|b| bout_passes(b, filter))
            .copied()
            .collect(),
        appearances,
        included,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::fixtures::*;
    use crate::join::{join_appearances, join_bouts};
    use chrono::NaiveDate;

    fn bout_ids(views: &FilteredViews<'_>) -> Vec<String> {
        views.bouts.iter().map(|b| b.bout.id.to_string()).collect()
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        let bouts = bouts_bundle();
        let appearances = appearances_bundle();
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);

        let out = apply_filters(
            &appearances,
            &bout_views,
            &appearance_views,
            &FilterState::default(),
        );

        assert_eq!(out.bouts.len(), 4);
        assert_eq!(out.appearances.len(), 3);
        assert_eq!(out.included.len(), appearances.included.len());
    }

    #[test]
    fn test_filter_byes_and_duals() {
        let bouts = bouts_bundle();
        let appearances = appearances_bundle();
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);

        let mut filter = FilterState::default();
        filter.include_byes = false;
        filter.set_include_duals(false);

        let out = apply_filters(&appearances, &bout_views, &appearance_views, &filter);

        assert_eq!(bout_ids(&out), vec!["b1", "b2"]);
        assert_eq!(out.appearances.len(), 2);
        assert!(out.appearances.iter().all(|a| !a.is_dual()));
    }

    #[test]
    fn test_filter_tournaments_drops_their_placements() {
        let bouts = bouts_bundle();
        let appearances = appearances_bundle();
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);

        let mut filter = FilterState::default();
        filter.set_include_tournaments(false);

        let out = apply_filters(&appearances, &bout_views, &appearance_views, &filter);

        assert_eq!(bout_ids(&out), vec!["b3"]);
        assert!(out
            .included
            .iter()
            .all(|r| r.kind != RecordType::BracketPlacement));
        assert_eq!(out.included.len(), appearances.included.len() - 2);
    }

    #[test]
    fn test_excluded_placement_is_dropped_from_kept_appearance() {
        let bouts = bouts_bundle();
        let mut appearances = appearances_bundle();
        // A tournament appearance whose placement belongs to the dual
        for record in appearances.included.iter_mut() {
            if record.id.as_str() == "p1" {
                *record = record.clone().with_attr("eventId", "e2");
            }
        }
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);
        assert_eq!(appearance_views[0].placement_display(), "1st");

        let mut filter = FilterState::default();
        filter.set_include_duals(false);
        let out = apply_filters(&appearances, &bout_views, &appearance_views, &filter);

        assert!(out.included.iter().all(|r| r.id.as_str() != "p1"));
        let display: Vec<_> = out
            .appearances
            .iter()
            .map(|a| a.placement_display())
            .collect();
        assert_eq!(display, vec!["DNP", "4th"]);
    }

    #[test]
    fn test_filter_date_range_and_ignored_team() {
        let bouts = bouts_bundle();
        let appearances = appearances_bundle();
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);

        let filter = FilterState::default().with_date_range(
            NaiveDate::from_ymd_opt(2023, 11, 1),
            NaiveDate::from_ymd_opt(2024, 10, 31),
        );
        let out = apply_filters(&appearances, &bout_views, &appearance_views, &filter);
        assert_eq!(bout_ids(&out), vec!["b1", "b2", "b3"]);
        assert_eq!(out.appearances.len(), 2);

        let filter = filter.with_ignored_team("club-b");
        let out = apply_filters(&appearances, &bout_views, &appearance_views, &filter);
        assert_eq!(bout_ids(&out), vec!["b1", "b2"]);
        assert_eq!(out.appearances.len(), 1);
    }

    #[test]
    fn test_apply_filters_is_idempotent() {
        let bouts = bouts_bundle();
        let appearances = appearances_bundle();
        let bout_views = join_bouts(&bouts, &athlete());
        let appearance_views = join_appearances(&appearances);

        let mut filter = FilterState::default()
            .with_date_range(NaiveDate::from_ymd_opt(2023, 1, 1), None);
        filter.include_forfeits = false;

        let once = apply_filters(&appearances, &bout_views, &appearance_views, &filter);
        let twice = apply_filters(&appearances, &once.bouts, &once.appearances, &filter);

        assert_eq!(bout_ids(&once), bout_ids(&twice));
        assert_eq!(once.appearances.len(), twice.appearances.len());
        assert_eq!(once.included.len(), twice.included.len());
    }
}
