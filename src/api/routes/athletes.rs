use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{AthleteId, Bundle, FilterState};
use crate::parse_date;
use crate::report::{build_report, AthleteReport, Match};
use crate::storage::csv::{export_matches, export_seasons};
use crate::sync::{AthleteData, LoadOutcome, LoadPhase, LoadStatus};

/// Report filter query. Unset fields keep the server default.
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub duals: Option<bool>,
    pub tournaments: Option<bool>,
    pub byes: Option<bool>,
    pub forfeits: Option<bool>,
    /// Comma-separated team identities
    pub ignore_team: Option<String>,
}

impl ReportParams {
    pub fn to_filter(&self, base: &FilterState) -> Result<FilterState, ApiError> {
        let date = |raw: &Option<String>, name: &str| match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => parse_date(s)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest(format!("invalid {} date: {}", name, s))),
        };

        let mut filter = base.clone();
        let from = date(&self.from, "from")?;
        let to = date(&self.to, "to")?;
        if from.is_some() || to.is_some() {
            let start = from.or(filter.start_date);
            let end = to.or(filter.end_date);
            filter = filter.with_date_range(start, end);
        }

        if self.duals == Some(false) && self.tournaments == Some(false) {
            return Err(ApiError::BadRequest(
                "duals and tournaments cannot both be excluded".to_string(),
            ));
        }
        if let Some(duals) = self.duals {
            filter.set_include_duals(duals);
        }
        if let Some(tournaments) = self.tournaments {
            filter.set_include_tournaments(tournaments);
        }
        if let Some(byes) = self.byes {
            filter.include_byes = byes;
        }
        if let Some(forfeits) = self.forfeits {
            filter.include_forfeits = forfeits;
        }
        for team in self
            .ignore_team
            .iter()
            .flat_map(|t| t.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            filter = filter.with_ignored_team(team);
        }

        Ok(filter)
    }
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub outcome: LoadOutcome,
    pub status: LoadStatus,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    /// False while bouts are still downloading
    pub complete: bool,
    pub status: LoadStatus,
    #[serde(flatten)]
    pub report: AthleteReport,
}

fn parse_athlete(id: &str) -> Result<AthleteId, ApiError> {
    AthleteId::parse(id).ok_or_else(|| ApiError::BadRequest(format!("invalid athlete id: {}", id)))
}

/// Published data for the current athlete, partial or complete.
async fn loaded_data(state: &AppState, athlete: &AthleteId) -> Result<Arc<AthleteData>, ApiError> {
    let status = state.loader.status();
    let is_current = status.athlete.as_ref() == Some(athlete);

    if is_current && status.phase == LoadPhase::Failed {
        return Err(ApiError::Upstream(
            status.error.unwrap_or_else(|| "load failed".to_string()),
        ));
    }

    match state.loader.data_for(athlete).await {
        Some(data) => Ok(data),
        None if is_current && status.is_busy() => Err(ApiError::Conflict(format!(
            "{} is still loading ({:.0}%)",
            athlete, status.progress
        ))),
        None => Err(ApiError::NotFound(format!(
            "{} is not loaded; POST /api/athletes/{}/load first",
            athlete, athlete
        ))),
    }
}

/// Report for `athlete`, cached once its bouts are in.
async fn current_report(
    state: &AppState,
    athlete: &AthleteId,
    filter: &FilterState,
) -> Result<(Arc<AthleteReport>, bool), ApiError> {
    let data = loaded_data(state, athlete).await?;

    match &data.bouts {
        Some(bouts) => {
            let mut reports = state.reports.lock().await;
            let report = reports.get_or_build(
                athlete,
                data.generation,
                &data.appearances,
                bouts,
                filter,
            );
            Ok((report, true))
        }
        None => {
            let report = build_report(athlete, &data.appearances, &Bundle::default(), filter);
            Ok((Arc::new(report), false))
        }
    }
}

async fn complete_report(
    state: &AppState,
    id: &str,
    params: &ReportParams,
) -> Result<Arc<AthleteReport>, ApiError> {
    let athlete = parse_athlete(id)?;
    let filter = params.to_filter(&state.default_filter)?;
    let (report, complete) = current_report(state, &athlete, &filter).await?;
    if !complete {
        return Err(ApiError::Conflict(format!("bouts for {} are still loading", athlete)));
    }
    Ok(report)
}

pub async fn load(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LoadResponse>, ApiError> {
    let athlete = parse_athlete(&id)?;
    let outcome = state.loader.load(athlete).await;
    Ok(Json(LoadResponse {
        outcome,
        status: state.loader.status(),
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LoadStatus>, ApiError> {
    let athlete = parse_athlete(&id)?;
    let status = state.loader.status();
    if status.athlete.as_ref() != Some(&athlete) {
        return Err(ApiError::NotFound(format!("{} has not been requested", athlete)));
    }
    Ok(Json(status))
}

pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportResponse>, ApiError> {
    let athlete = parse_athlete(&id)?;
    let filter = params.to_filter(&state.default_filter)?;
    let (report, complete) = current_report(&state, &athlete, &filter).await?;

    Ok(Json(ReportResponse {
        complete,
        status: state.loader.status(),
        report: (*report).clone(),
    }))
}

pub async fn matches(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<Match>>, ApiError> {
    let report = complete_report(&state, &id, &params).await?;
    Ok(Json(report.matches().cloned().collect()))
}

pub async fn matches_csv(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = complete_report(&state, &id, &params).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        export_matches(report.matches()),
    ))
}

pub async fn seasons_csv(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = complete_report(&state, &id, &params).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        export_seasons(&report.seasons),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::config::ArenaConfig;
    use crate::join::fixtures::*;
    use crate::sync::testing::ScriptedSource;
    use crate::sync::{ArenaClient, AthleteLoader};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn setup_state(source: ScriptedSource) -> AppState {
        let loader = AthleteLoader::new(Arc::new(source));
        let arena = ArenaClient::new(&ArenaConfig::default()).unwrap();
        AppState::new(loader, arena, FilterState::default())
    }

    fn loaded_source() -> ScriptedSource {
        ScriptedSource::new().with_athlete(&athlete(), appearances_bundle(), bouts_bundle())
    }

    async fn send(app: axum::Router, method: &str, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let (status, body) = send(app, "GET", uri).await;
        (status, serde_json::from_str(&body).unwrap_or(Value::Null))
    }

    fn report_uri(query: &str) -> String {
        format!("/api/athletes/{}/report{}", ATHLETE, query)
    }

    #[test]
    fn test_params_to_filter() {
        let params = ReportParams {
            from: Some("2023-01-01".into()),
            duals: Some(false),
            byes: Some(false),
            ignore_team: Some("club-a, club-b,".into()),
            ..Default::default()
        };

        let filter = params.to_filter(&FilterState::default()).unwrap();

        assert_eq!(filter.start_date, parse_date("2023-01-01"));
        assert_eq!(filter.end_date, None);
        assert!(!filter.include_duals());
        assert!(filter.include_tournaments());
        assert!(!filter.include_byes);
        assert!(filter.include_forfeits);
        assert_eq!(filter.ignored_teams.len(), 2);
    }

    #[test]
    fn test_params_reject_bad_input() {
        let bad_date = ReportParams {
            to: Some("31/12/2023".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_date.to_filter(&FilterState::default()),
            Err(ApiError::BadRequest(_))
        ));

        let no_events = ReportParams {
            duals: Some(false),
            tournaments: Some(false),
            ..Default::default()
        };
        assert!(matches!(
            no_events.to_filter(&FilterState::default()),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_report_requires_load() {
        let state = setup_state(loaded_source());

        let (status, json) = get_json(build_router(state.clone()), &report_uri("")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");

        let (status, _) = get_json(build_router(state), "/api/athletes/not-a-uuid/report").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_load_then_report() {
        let state = setup_state(loaded_source());

        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            &format!("/api/athletes/{}/load", ATHLETE),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["outcome"]["outcome"], "started");

        state.loader.load_and_wait(athlete()).await.unwrap();

        let (status, json) = get_json(build_router(state.clone()), &report_uri("")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["complete"], true);
        assert_eq!(json["totals"]["matches"], 4);
        assert_eq!(json["seasons"].as_array().unwrap().len(), 2);
        assert_eq!(json["status"]["phase"], "loaded");

        let (status, json) = get_json(
            build_router(state.clone()),
            &format!("/api/athletes/{}/status", ATHLETE),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["progress"], 100.0);
    }

    #[tokio::test]
    async fn test_report_filters() {
        let state = setup_state(loaded_source());
        state.loader.load_and_wait(athlete()).await.unwrap();

        let (_, json) = get_json(build_router(state.clone()), &report_uri("?duals=false")).await;
        assert_eq!(json["totals"]["matches"], 3);

        let (_, json) = get_json(build_router(state.clone()), &report_uri("?from=2023-01-01")).await;
        assert_eq!(json["totals"]["matches"], 3);
        assert_eq!(json["seasons"].as_array().unwrap().len(), 1);

        let (status, _) = get_json(
            build_router(state.clone()),
            &report_uri("?duals=false&tournaments=false"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(state.reports.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_csv_exports() {
        let state = setup_state(loaded_source());
        state.loader.load_and_wait(athlete()).await.unwrap();

        let (status, body) = send(
            build_router(state.clone()),
            "GET",
            &format!("/api/athletes/{}/matches.csv", ATHLETE),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Date,Event,Opponent,Opponent-Team,Result,Outcome,Round,Weight-Class\n"));
        assert_eq!(body.lines().count(), 5);

        let (status, body) = send(
            build_router(state),
            "GET",
            &format!("/api/athletes/{}/seasons.csv", ATHLETE),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("2022-23,1,1,0,0,0,1:0"));
    }

    #[tokio::test]
    async fn test_report_while_loading_is_conflict() {
        let state = setup_state(loaded_source().with_delay(&athlete(), Duration::from_millis(300)));

        state.loader.load(athlete()).await;
        let (status, json) = get_json(build_router(state.clone()), &report_uri("")).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_partial_report_while_bouts_load() {
        let state = setup_state(
            loaded_source().with_bout_delay(&athlete(), Duration::from_millis(300)),
        );
        let mut rx = state.loader.subscribe();

        state.loader.load(athlete()).await;
        rx.wait_for(|s| s.phase == LoadPhase::AppearancesReady)
            .await
            .unwrap();

        let (status, json) = get_json(build_router(state.clone()), &report_uri("")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["complete"], false);
        assert_eq!(json["status"]["phase"], "appearances_ready");
        assert_eq!(json["status"]["appearances"], 3);
        assert_eq!(json["status"]["bouts"], Value::Null);
        assert_eq!(json["profile"]["name"], "Sam Ortiz");
        assert_eq!(json["placements"].as_array().unwrap().len(), 3);
        assert_eq!(json["totals"]["matches"], 0);
        assert!(state.reports.lock().await.is_empty());

        let (status, _) = send(
            build_router(state.clone()),
            "GET",
            &format!("/api/athletes/{}/matches.csv", ATHLETE),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        state.loader.load_and_wait(athlete()).await.unwrap();
        let (_, json) = get_json(build_router(state), &report_uri("")).await;
        assert_eq!(json["complete"], true);
        assert_eq!(json["totals"]["matches"], 4);
    }

    #[tokio::test]
    async fn test_reloaded_athlete_gets_fresh_report() {
        let rival = AthleteId::parse(RIVAL).unwrap();
        let mut fewer = bouts_bundle();
        fewer.primary.truncate(3);
        let state = setup_state(
            loaded_source()
                .with_athlete(&rival, Bundle::default(), Bundle::default())
                .with_reload(&athlete(), fewer),
        );

        state.loader.load_and_wait(athlete()).await.unwrap();
        let (_, json) = get_json(build_router(state.clone()), &report_uri("")).await;
        assert_eq!(json["totals"]["matches"], 4);

        // Switch away without asking for a report, then come back
        state.loader.load_and_wait(rival).await.unwrap();
        state.loader.load_and_wait(athlete()).await.unwrap();

        let (_, json) = get_json(build_router(state), &report_uri("")).await;
        assert_eq!(json["totals"]["matches"], 3);
    }

    #[tokio::test]
    async fn test_failed_load_is_upstream_error() {
        let state = setup_state(loaded_source().with_failure(&athlete()));
        assert!(state.loader.load_and_wait(athlete()).await.is_err());

        let (status, json) = get_json(build_router(state), &report_uri("")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"]["message"].as_str().unwrap().contains("503"));
    }
}
