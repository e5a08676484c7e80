//! Athlete load orchestrator.
//!
//! Loads one athlete at a time in two stages:
//! 1. Fetch wrestler appearances (progress 0-50), then publish them
//! 2. Fetch bouts (progress 50-100), then publish the complete data
//!
//! A request for the athlete that is already loaded or loading is a no-op.
//! A request for a different athlete aborts the in-flight load; a
//! generation counter discards anything the aborted task might still
//! publish.

pub mod arena;

pub use arena::{
    ArenaClient, AthleteSource, OnPercent, SearchPage, SearchPerson, SEARCH_PAGE_SIZE,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{AthleteId, Bundle};
use crate::storage::snapshot;

/// Errors that can occur while loading an athlete.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::fetch::FetchError),

    #[error("Invalid athlete id: {0}")]
    InvalidAthlete(String),

    #[error("Load of {0} was superseded")]
    Superseded(AthleteId),

    #[error("Load failed: {0}")]
    Failed(String),

    #[error("Load task failed: {0}")]
    Task(String),
}

/// Stage of the current load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    /// Appearances are published, bouts are still downloading
    AppearancesReady,
    Loaded,
    Failed,
}

/// Observable state of the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoadStatus {
    pub athlete: Option<AthleteId>,
    pub phase: LoadPhase,

    /// Percent complete; never decreases within one load
    pub progress: f64,

    /// Incremented for every started load
    pub generation: u64,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Primary records received per stage
    pub appearances: Option<usize>,
    pub bouts: Option<usize>,

    pub error: Option<String>,
}

impl LoadStatus {
    fn loading(athlete: AthleteId, generation: u64) -> Self {
        Self {
            athlete: Some(athlete),
            phase: LoadPhase::Loading,
            progress: 0.0,
            generation,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, LoadPhase::Loading | LoadPhase::AppearancesReady)
    }
}

/// What a load request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LoadOutcome {
    Started { generation: u64 },
    AlreadyLoading { generation: u64 },
    AlreadyLoaded,
}

/// Data published for an athlete.
///
/// `bouts` is `None` between the two stages.
#[derive(Debug, Clone)]
pub struct AthleteData {
    pub athlete: AthleteId,
    pub appearances: Arc<Bundle>,
    pub bouts: Option<Arc<Bundle>>,
    /// Load that published this data
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
}

impl AthleteData {
    pub fn is_complete(&self) -> bool {
        self.bouts.is_some()
    }
}

struct InFlight {
    athlete: AthleteId,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct LoaderState {
    generation: u64,
    in_flight: Option<InFlight>,
    data: Option<Arc<AthleteData>>,
}

/// Raise the progress of `generation` to `percent` if that is higher.
fn record_progress(status: &watch::Sender<LoadStatus>, generation: u64, percent: f64) {
    let percent = percent.clamp(0.0, 100.0);
    status.send_if_modified(|s| {
        if s.generation != generation || percent <= s.progress {
            return false;
        }
        s.progress = percent;
        true
    });
}

/// Single-flight athlete loader.
#[derive(Clone)]
pub struct AthleteLoader {
    source: Arc<dyn AthleteSource>,
    state: Arc<RwLock<LoaderState>>,
    status: Arc<watch::Sender<LoadStatus>>,
    snapshot_dir: Option<PathBuf>,
}

impl AthleteLoader {
    pub fn new(source: Arc<dyn AthleteSource>) -> Self {
        let (status, _) = watch::channel(LoadStatus::default());
        Self {
            source,
            state: Arc::new(RwLock::new(LoaderState::default())),
            status: Arc::new(status),
            snapshot_dir: None,
        }
    }

    /// Builder method to write every fetched bundle under `dir`.
    pub fn with_snapshots(mut self, dir: PathBuf) -> Self {
        self.snapshot_dir = Some(dir);
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Current status.
    pub fn status(&self) -> LoadStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<LoadStatus> {
        self.status.subscribe()
    }

    /// Latest published data, possibly appearances only.
    pub async fn current(&self) -> Option<Arc<AthleteData>> {
        self.state.read().await.data.clone()
    }

    /// Published data for `athlete`, if it is the current one.
    pub async fn data_for(&self, athlete: &AthleteId) -> Option<Arc<AthleteData>> {
        self.current().await.filter(|d| &d.athlete == athlete)
    }

    /// Start loading `athlete` in the background.
    pub async fn load(&self, athlete: AthleteId) -> LoadOutcome {
        let mut state = self.state.write().await;

        if let Some(flight) = &state.in_flight {
            if flight.athlete == athlete {
                debug!("Load of {} already in flight", athlete);
                return LoadOutcome::AlreadyLoading {
                    generation: flight.generation,
                };
            }
        }
        if state
            .data
            .as_ref()
            .is_some_and(|d| d.athlete == athlete && d.is_complete())
        {
            debug!("{} already loaded", athlete);
            return LoadOutcome::AlreadyLoaded;
        }

        if let Some(old) = state.in_flight.take() {
            old.handle.abort();
            info!("Load of {} superseded by {}", old.athlete, athlete);
        }

        state.data = None;
        state.generation += 1;
        let generation = state.generation;
        self.status
            .send_replace(LoadStatus::loading(athlete.clone(), generation));

        let task = LoadTask {
            source: self.source.clone(),
            state: self.state.clone(),
            status: self.status.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            athlete: athlete.clone(),
            generation,
        };
        info!("Loading {} from {} (generation {})", athlete, self.source.name(), generation);
        let handle = tokio::spawn(task.run());

        state.in_flight = Some(InFlight {
            athlete,
            generation,
            handle,
        });
        LoadOutcome::Started { generation }
    }

    /// Load `athlete` and wait for the complete data.
    pub async fn load_and_wait(&self, athlete: AthleteId) -> Result<Arc<AthleteData>, SyncError> {
        let mut rx = self.subscribe();

        let generation = match self.load(athlete.clone()).await {
            LoadOutcome::AlreadyLoaded => {
                return self
                    .data_for(&athlete)
                    .await
                    .filter(|d| d.is_complete())
                    .ok_or(SyncError::Superseded(athlete));
            }
            LoadOutcome::Started { generation } | LoadOutcome::AlreadyLoading { generation } => {
                generation
            }
        };

        loop {
            {
                let status = rx.borrow_and_update();
                if status.generation != generation {
                    return Err(SyncError::Superseded(athlete));
                }
                match status.phase {
                    LoadPhase::Loaded => break,
                    LoadPhase::Failed => {
                        return Err(SyncError::Failed(
                            status.error.clone().unwrap_or_default(),
                        ))
                    }
                    _ => {}
                }
            }
            rx.changed()
                .await
                .map_err(|_| SyncError::Task("status channel closed".to_string()))?;
        }

        self.data_for(&athlete)
            .await
            .filter(|d| d.is_complete())
            .ok_or(SyncError::Superseded(athlete))
    }
}

/// One spawned load.
struct LoadTask {
    source: Arc<dyn AthleteSource>,
    state: Arc<RwLock<LoaderState>>,
    status: Arc<watch::Sender<LoadStatus>>,
    snapshot_dir: Option<PathBuf>,
    athlete: AthleteId,
    generation: u64,
}

impl LoadTask {
    async fn run(self) {
        let start = Instant::now();
        match self.execute().await {
            Ok(()) => info!(
                "Loaded {} in {:.2}s",
                self.athlete,
                start.elapsed().as_secs_f64()
            ),
            Err(SyncError::Superseded(_)) => {
                debug!("Discarded stale load of {}", self.athlete)
            }
            Err(e) => self.fail(e).await,
        }
    }

    fn progress(&self, percent: f64) {
        record_progress(&self.status, self.generation, percent);
    }

    fn is_current(&self, state: &LoaderState) -> bool {
        state.generation == self.generation
    }

    async fn execute(&self) -> Result<(), SyncError> {
        let appearances = self
            .source
            .fetch_appearances(&self.athlete, &|p| self.progress(p / 2.0))
            .await?;
        let appearances = Arc::new(appearances);
        self.snapshot(snapshot::APPEARANCES, &appearances).await;

        {
            let mut state = self.state.write().await;
            if !self.is_current(&state) {
                return Err(SyncError::Superseded(self.athlete.clone()));
            }
            state.data = Some(Arc::new(AthleteData {
                athlete: self.athlete.clone(),
                appearances: appearances.clone(),
                bouts: None,
                generation: self.generation,
                fetched_at: Utc::now(),
            }));
        }
        let count = appearances.primary.len();
        self.status.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            s.phase = LoadPhase::AppearancesReady;
            s.progress = s.progress.max(50.0);
            s.appearances = Some(count);
            true
        });
        info!("{} appearances ready for {}", count, self.athlete);

        let bouts = self
            .source
            .fetch_bouts(&self.athlete, &|p| self.progress(50.0 + p / 2.0))
            .await?;
        self.snapshot(snapshot::BOUTS, &bouts).await;

        let count = bouts.primary.len();
        {
            let mut state = self.state.write().await;
            if !self.is_current(&state) {
                return Err(SyncError::Superseded(self.athlete.clone()));
            }
            state.data = Some(Arc::new(AthleteData {
                athlete: self.athlete.clone(),
                appearances,
                bouts: Some(Arc::new(bouts)),
                generation: self.generation,
                fetched_at: Utc::now(),
            }));
            state.in_flight = None;
        }
        self.status.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            s.phase = LoadPhase::Loaded;
            s.progress = 100.0;
            s.bouts = Some(count);
            s.finished_at = Some(Utc::now());
            true
        });

        Ok(())
    }

    async fn snapshot(&self, stage: &str, bundle: &Bundle) {
        let Some(dir) = &self.snapshot_dir else {
            return;
        };
        match snapshot::write_bundle(dir, &self.athlete, stage, bundle).await {
            Ok(path) => debug!("Wrote snapshot {}", path.display()),
            Err(e) => warn!("Failed to write {} snapshot: {}", stage, e),
        }
    }

    async fn fail(&self, err: SyncError) {
        error!("Load of {} failed: {}", self.athlete, err);
        {
            let mut state = self.state.write().await;
            if !self.is_current(&state) {
                return;
            }
            state.in_flight = None;
        }
        let message = err.to_string();
        self.status.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            s.phase = LoadPhase::Failed;
            s.error = Some(message);
            s.finished_at = Some(Utc::now());
            true
        });
    }
}
