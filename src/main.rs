use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mat_history::api::{build_router, state::AppState};
use mat_history::config::AppConfig;
use mat_history::parse_date;
use mat_history::report::{build_report, AthleteReport};
use mat_history::storage::csv::{export_matches, export_seasons, write_export};
use mat_history::storage::snapshot::SnapshotSource;
use mat_history::sync::{
    ArenaClient, AthleteLoader, AthleteSource, LoadPhase, SearchPage, SEARCH_PAGE_SIZE,
};
use mat_history::AthleteId;

#[derive(Parser)]
#[command(name = "mat-history")]
#[command(about = "Wrestler career history from FloArena results")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an athlete and print their history
    Athlete {
        /// Athlete id, or any link containing one
        id: String,

        /// Only bouts on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Only bouts on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Exclude dual meets
        #[arg(long)]
        no_duals: bool,

        /// Exclude tournaments
        #[arg(long)]
        no_tournaments: bool,

        /// Exclude byes
        #[arg(long)]
        no_byes: bool,

        /// Exclude forfeits
        #[arg(long)]
        no_forfeits: bool,

        /// Hide bouts for a team identity (repeatable)
        #[arg(long)]
        ignore_team: Vec<String>,

        /// Write the matches table as CSV
        #[arg(long)]
        matches_csv: Option<PathBuf>,

        /// Write the seasons table as CSV
        #[arg(long)]
        seasons_csv: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Read bundles from a snapshot directory instead of the API
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Search people by name
    Search {
        name: String,

        /// Results page (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Print every result on one page
        #[arg(long)]
        all: bool,
    },

    /// Start the API server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(std::path::Path::new(&cli.config))
        .with_context(|| format!("loading {}", cli.config))?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    tracing_subscriber::registry()
        .with(filter)
        .with(cli.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting mat-history v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Athlete {
            id,
            from,
            to,
            no_duals,
            no_tournaments,
            no_byes,
            no_forfeits,
            ignore_team,
            matches_csv,
            seasons_csv,
            json,
            replay,
        } => {
            let athlete =
                AthleteId::parse(&id).ok_or_else(|| anyhow!("No athlete id found in {:?}", id))?;

            if no_duals && no_tournaments {
                bail!("--no-duals and --no-tournaments cannot be combined");
            }
            let mut filter = config.filter.to_filter();
            let date = |raw: Option<String>, flag: &str| -> Result<_> {
                raw.map(|s| {
                    parse_date(&s).ok_or_else(|| anyhow!("Invalid {} date (expected YYYY-MM-DD): {}", flag, s))
                })
                .transpose()
            };
            filter = filter.with_date_range(date(from, "--from")?, date(to, "--to")?);
            if no_duals {
                filter.set_include_duals(false);
            }
            if no_tournaments {
                filter.set_include_tournaments(false);
            }
            filter.include_byes &= !no_byes;
            filter.include_forfeits &= !no_forfeits;
            for team in ignore_team {
                filter = filter.with_ignored_team(team);
            }

            let source: Arc<dyn AthleteSource> = match &replay {
                Some(dir) => Arc::new(SnapshotSource::new(dir.clone())),
                None => Arc::new(ArenaClient::new(&config.arena)?),
            };
            let mut loader = AthleteLoader::new(source);
            if config.diagnostics.snapshots && replay.is_none() {
                loader = loader.with_snapshots(config.snapshot_dir());
            }

            let progress = spawn_progress_logger(&loader);
            let data = loader.load_and_wait(athlete.clone()).await;
            progress.abort();
            let data = data?;
            let bouts = data
                .bouts
                .as_deref()
                .ok_or_else(|| anyhow!("Bouts for {} were not loaded", athlete))?;

            let report = build_report(&athlete, &data.appearances, bouts, &filter);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            if let Some(path) = matches_csv {
                write_export(&path, &export_matches(report.matches()))?;
            }
            if let Some(path) = seasons_csv {
                write_export(&path, &export_seasons(&report.seasons))?;
            }
        }
        Commands::Search { name, page, all } => {
            let client = ArenaClient::new(&config.arena)?;
            let people = client.search_people(&name).await?;

            let page = if all {
                SearchPage::all(&name, people)
            } else {
                SearchPage::paginate(&name, people, page, SEARCH_PAGE_SIZE)
            };

            for person in &page.results {
                println!(
                    "{}  {:<28} {:>6}  {}",
                    person.id,
                    person.name,
                    person.grad_year.map(|y| y.to_string()).unwrap_or_default(),
                    person.location.as_deref().unwrap_or("")
                );
            }
            println!(
                "Page {} of {} ({} results for {:?})",
                page.page, page.pages, page.total, page.query
            );
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let arena = ArenaClient::new(&config.arena)?;
            let mut loader = AthleteLoader::new(Arc::new(arena.clone()));
            if config.diagnostics.snapshots {
                loader = loader.with_snapshots(config.snapshot_dir());
            }
            let state = AppState::new(loader, arena, config.filter.to_filter())
                .with_cors_origin(config.server.cors_origin.clone());

            let app = build_router(state);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Log load progress in 10% steps and on every phase change.
fn spawn_progress_logger(loader: &AthleteLoader) -> tokio::task::JoinHandle<()> {
    let mut rx = loader.subscribe();
    tokio::spawn(async move {
        let mut last = (LoadPhase::Idle, -1i64);
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            let step = (status.progress / 10.0).floor() as i64;
            if (status.phase, step) != last {
                tracing::info!("{:?} {:>3.0}%", status.phase, status.progress);
                last = (status.phase, step);
            }
        }
    })
}

fn print_report(report: &AthleteReport) {
    let profile = &report.profile;
    println!("{}", profile.name.as_deref().unwrap_or("Unknown"));
    let details: Vec<String> = [
        profile.grade.clone(),
        profile.team.clone(),
        profile.location.clone(),
        profile.date_of_birth.as_ref().map(|d| format!("born {}", d)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        println!("{}", details.join(" | "));
    }
    if let (Some(oldest), Some(newest)) = (profile.oldest_year, profile.newest_year) {
        println!("Seasons {}-{}", oldest, newest + 1);
    }
    println!();

    println!(
        "{:<9} {:>7} {:>5} {:>6} {:>5} {:>5} {:>7} {:>7}",
        "Season", "Matches", "Wins", "Losses", "Pins", "Techs", "Ratio", "Win %"
    );
    let rows = report
        .seasons
        .iter()
        .map(|s| (s.name.as_str(), &s.stats))
        .chain(std::iter::once(("Total", &report.totals)));
    for (name, stats) in rows {
        println!(
            "{:<9} {:>7} {:>5} {:>6} {:>5} {:>5} {:>7} {:>7}",
            name,
            stats.stats.matches,
            stats.stats.wins,
            stats.stats.losses,
            stats.stats.pins,
            stats.stats.techs,
            stats.stats.ratio_display(),
            stats
                .win_percentage
                .map(|p| format!("{:.1}", p * 100.0))
                .unwrap_or_else(|| "-".to_string())
        );
    }

    if let Some(q) = &report.totals.stats.quickest_win {
        println!("Quickest fall win:  {}", q.time);
    }
    if let Some(q) = &report.totals.stats.quickest_loss {
        println!("Quickest fall loss: {}", q.time);
    }

    if !report.teams.is_empty() {
        println!();
        println!("Teams");
        for team in &report.teams {
            println!(
                "  {:<30} {:>4} matches  {}",
                team.name.as_deref().unwrap_or("Unknown"),
                team.matches,
                team.location.as_deref().unwrap_or("")
            );
        }
    }

    if !report.placements.is_empty() {
        println!();
        println!("Placements");
        for placement in &report.placements {
            println!(
                "  {:<5} {:<40} {}",
                placement.placement,
                placement.event.name.as_deref().unwrap_or("Unknown"),
                placement.weight_class.as_deref().unwrap_or("")
            );
        }
    }
}
