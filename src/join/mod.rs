//! Relationship joiner.
//!
//! Turns normalized bout and wrestler-appearance records into denormalized
//! views by resolving every `(type, id)` reference against the bundle's
//! `included` table. Unresolvable references become `None`; nothing here
//! fails.

use crate::models::{AppearanceView, AthleteId, BoutView, Bundle, Record, RecordType, WinType};

fn wrestler_matches(wrestler: Option<&Record>, athlete: &AthleteId) -> bool {
    wrestler
        .and_then(Record::identity_person_id)
        .is_some_and(|id| athlete.matches(id))
}

/// Join one bout from the perspective of `athlete`.
///
/// When neither side belongs to the athlete, `this_wrestler` and `opponent`
/// are both `None` and the view reports [`crate::models::JoinAnomaly::AthleteNotInBout`].
pub fn join_bout<'a>(bout: &'a Record, bundle: &'a Bundle, athlete: &AthleteId) -> BoutView<'a> {
    let wrestler = move |attr: &str, rel: &str| {
        bundle.resolve(&RecordType::Wrestler, bout.related_id(attr, rel).as_ref())
    };

    let top_wrestler = wrestler("topWrestlerId", "topWrestler");
    let bottom_wrestler = wrestler("bottomWrestlerId", "bottomWrestler");
    let winner = wrestler("winnerWrestlerId", "winnerWrestler");

    let (this_wrestler, opponent) = if wrestler_matches(top_wrestler, athlete) {
        (top_wrestler, bottom_wrestler)
    } else if wrestler_matches(bottom_wrestler, athlete) {
        (bottom_wrestler, top_wrestler)
    } else {
        (None, None)
    };

    let event = bundle.resolve(&RecordType::Event, bout.related_id("eventId", "event").as_ref());
    let weight_class = bundle.resolve(
        &RecordType::WeightClass,
        bout.related_id("weightClassId", "weightClass").as_ref(),
    );
    let round_name = bundle.resolve(
        &RecordType::RoundName,
        bout.related_id("roundNameId", "roundName").as_ref(),
    );

    let team_of = move |w: Option<&'a Record>| {
        w.and_then(|w| bundle.resolve(&RecordType::Team, w.related_id("teamId", "team").as_ref()))
    };
    let division = this_wrestler.and_then(|w| {
        bundle.resolve(
            &RecordType::Division,
            w.related_id("divisionId", "division").as_ref(),
        )
    });

    let effective_date = bout
        .datetime_attr("goDateTime")
        .or_else(|| bout.datetime_attr("endDateTime"))
        .or_else(|| event.and_then(|e| e.datetime_attr("startDateTime")));

    let no_opponent_reason = WinType::from_code(bout.str_attr("winType")).no_opponent_reason();

    BoutView {
        bout,
        event,
        weight_class,
        round_name,
        division,
        top_wrestler,
        bottom_wrestler,
        winner,
        opponent,
        opponent_team: team_of(opponent),
        this_wrestler,
        this_team: team_of(this_wrestler),
        effective_date,
        is_win: wrestler_matches(winner, athlete),
        has_no_opponent: no_opponent_reason.is_some(),
        no_opponent_reason,
    }
}

/// Join every primary bout of a bundle, in bundle order.
pub fn join_bouts<'a>(bundle: &'a Bundle, athlete: &AthleteId) -> Vec<BoutView<'a>> {
    bundle
        .primary
        .iter()
        .map(|bout| join_bout(bout, bundle, athlete))
        .collect()
}

/// Join one wrestler-appearance record.
///
/// The placement is the first entry of its `bracketPlacements`
/// relationship; records without the relationship fall back to the first
/// included placement pointing back at the appearance.
pub fn join_appearance<'a>(appearance: &'a Record, bundle: &'a Bundle) -> AppearanceView<'a> {
    let related = move |kind: RecordType, attr: &str, rel: &str| {
        bundle.resolve(&kind, appearance.related_id(attr, rel).as_ref())
    };

    let placement = match appearance.related_ids("bracketPlacements").first() {
        Some(id) => bundle.resolve(&RecordType::BracketPlacement, Some(id)),
        None => bundle.included.iter().find(|r| {
            r.kind == RecordType::BracketPlacement
                && r.str_attr("wrestlerId") == Some(appearance.id.as_str())
        }),
    };

    AppearanceView {
        appearance,
        event: related(RecordType::Event, "eventId", "event"),
        weight_class: related(RecordType::WeightClass, "weightClassId", "weightClass"),
        division: related(RecordType::Division, "divisionId", "division"),
        team: related(RecordType::Team, "teamId", "team"),
        grade: related(RecordType::Grade, "gradeId", "grade"),
        placement,
    }
}

/// Join every primary appearance of a bundle, in bundle order.
pub fn join_appearances(bundle: &Bundle) -> Vec<AppearanceView<'_>> {
    bundle
        .primary
        .iter()
        .map(|appearance| join_appearance(appearance, bundle))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::{JoinAnomaly, NoOpponentReason, RecordId};

    #[test]
    fn test_join_bout_orients_to_athlete() {
        let bundle = bouts_bundle();
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());

        assert_eq!(view.this_wrestler.unwrap().id, RecordId::from("me1"));
        assert_eq!(view.opponent.unwrap().id, RecordId::from("op1"));
        assert_eq!(view.this_team_identity(), Some("club-a"));
        assert_eq!(view.opponent_team.unwrap().str_attr("name"), Some("Rival WC"));
        assert_eq!(view.division.unwrap().str_attr("name"), Some("High School"));
        assert_eq!(view.round_name.unwrap().str_attr("displayName"), Some("Quarterfinal"));
        assert!(view.is_win);
        assert!(!view.has_no_opponent);
        assert!(view.anomalies().is_empty());
    }

    #[test]
    fn test_join_bout_bottom_side_and_loss() {
        let bundle = Bundle::new(
            vec![bout("b9", "e1", "op1", "me1", true, "DEC", "Dec 3-1")],
            shared_included(),
        );
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());

        assert_eq!(view.this_wrestler.unwrap().id, RecordId::from("me1"));
        assert_eq!(view.opponent.unwrap().id, RecordId::from("op1"));
        assert!(!view.is_win);
    }

    #[test]
    fn test_join_bout_athlete_on_neither_side() {
        let bundle = Bundle::new(
            vec![bout("b9", "e1", "op1", "ghost", true, "DEC", "Dec 3-1")],
            shared_included(),
        );
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());

        assert!(view.this_wrestler.is_none());
        assert!(view.opponent.is_none());
        assert!(view.bottom_wrestler.is_none());
        assert_eq!(view.anomalies(), vec![JoinAnomaly::AthleteNotInBout]);
    }

    #[test]
    fn test_join_bout_effective_date_fallbacks() {
        let bundle = bouts_bundle();
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());
        // No bout times, so the event start date is used
        assert_eq!(
            view.effective_date.unwrap().to_rfc3339(),
            "2023-12-05T15:00:00+00:00"
        );

        let timed = bout("b5", "e1", "me1", "op1", true, "F", "F 1:00")
            .with_attr("goDateTime", "2023-12-06T09:30:00Z")
            .with_attr("endDateTime", "2023-12-06T09:40:00Z");
        let bundle = Bundle::new(vec![timed], shared_included());
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());
        assert_eq!(
            view.effective_date.unwrap().to_rfc3339(),
            "2023-12-06T09:30:00+00:00"
        );

        let orphan = bout("b6", "missing", "me1", "op1", true, "F", "");
        let bundle = Bundle::new(vec![orphan], shared_included());
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());
        assert!(view.event.is_none());
        assert!(view.effective_date.is_none());
    }

    #[test]
    fn test_join_bout_no_opponent() {
        let bundle = bouts_bundle();
        let view = join_bout(&bundle.primary[3], &bundle, &athlete());
        assert!(view.has_no_opponent);
        assert_eq!(view.no_opponent_reason, Some(NoOpponentReason::Bye));
    }

    #[test]
    fn test_join_bout_missing_team_is_reported() {
        let mut included = shared_included();
        included.retain(|r| r.id != RecordId::from("t1"));
        let bundle = Bundle::new(
            vec![bout("b1", "e1", "me1", "op1", true, "F", "F 1:30")],
            included,
        );
        let view = join_bout(&bundle.primary[0], &bundle, &athlete());
        assert!(view.this_team.is_none());
        assert_eq!(view.anomalies(), vec![JoinAnomaly::MissingTeam]);
    }

    #[test]
    fn test_join_appearance() {
        let bundle = appearances_bundle();
        let views = join_appearances(&bundle);

        assert_eq!(views.len(), 3);
        assert_eq!(views[0].placement_display(), "1st");
        assert_eq!(views[0].grade_name(), Some("Junior"));
        assert_eq!(views[0].team_identity(), Some("club-a"));
        assert_eq!(views[0].weight_class.unwrap().f64_attr("maxWeight"), Some(132.0));
        assert_eq!(views[1].placement_display(), "DNP");
        assert!(views[1].is_dual());
    }
}
