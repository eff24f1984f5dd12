use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use pwin_engine::application::batch::BatchRunner;
use pwin_engine::application::query::{AsOfQuery, Estimate};
use pwin_engine::application::snapshot::{SnapshotHistory, rebalance_dates};
use pwin_engine::application::trend_matrix::TrendMatrix;
use pwin_engine::config::Config;
use pwin_engine::domain::estimation::state::StateKey;
use pwin_engine::domain::series::calendar::CalendarPeriod;
use pwin_engine::domain::series::observation::ObservationStore;
use pwin_engine::infrastructure::csv_loader::{load_series, load_store, parse_timestamp};
use pwin_engine::infrastructure::export;
use pwin_engine::infrastructure::observability::{EngineMetrics, logging};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "State-conditioned outcome probabilities", long_about = None)]
struct Cli {
    /// Preset name or TOML file (overrides PWIN_DOMAIN_CONFIG)
    #[arg(short, long, global = true)]
    domain: Option<String>,

    /// Print Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Outcome table of one series as of a date
    Table {
        /// date,value CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Horizon name from the domain config
        #[arg(long, default_value = "daily")]
        horizon: String,

        /// As-of date (YYYY-MM-DD); defaults to now
        #[arg(long)]
        as_of: Option<String>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Probability of an outcome for every entity of a file or directory
    Query {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "daily")]
        horizon: String,

        #[arg(long)]
        as_of: Option<String>,

        /// Outcome class name
        #[arg(long, default_value = "1")]
        outcome: String,

        /// Explicit state, e.g. "1,0,1"; defaults to each entity's current state
        #[arg(long)]
        state: Option<String>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Point-in-time estimates of one series over a rebalance calendar
    Snapshots {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "daily")]
        horizon: String,

        /// Rebalance period (daily, weekly, monthly)
        #[arg(long, default_value = "monthly")]
        period: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value = "1")]
        outcome: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Current p_up per entity for every configured horizon
    Matrix {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        as_of: Option<String>,

        /// Skip the decision threshold column
        #[arg(long)]
        no_threshold: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_date(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(s) => parse_timestamp(s).with_context(|| format!("Invalid date '{}'", s)),
        None => Ok(Utc::now()),
    }
}

fn parse_state(raw: &str) -> Result<StateKey> {
    let parts = raw
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<i32>()
                .with_context(|| format!("Invalid state component '{}'", p))
        })
        .collect::<Result<Vec<i32>>>()?;
    Ok(StateKey::new(parts))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file = File::create(p).with_context(|| format!("Failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn write_estimates(estimates: &[Estimate], format: Format, output: Option<&Path>) -> Result<()> {
    let mut out = open_output(output)?;
    match format {
        Format::Csv => export::write_estimates_csv(estimates, &mut out)?,
        Format::Json => writeln!(out, "{}", export::estimates_json(estimates)?)?,
    }
    out.flush()?;
    Ok(())
}

fn runner(config: &Config, metrics: Option<&EngineMetrics>) -> Result<BatchRunner> {
    let mut runner = BatchRunner::new(Arc::new(config.pipeline()?));
    if let Some(threads) = config.engine.threads {
        runner = runner.with_threads(threads);
    }
    if let Some(metrics) = metrics {
        runner = runner.with_metrics(metrics.clone());
    }
    Ok(runner)
}

fn load(input: &Path) -> Result<ObservationStore> {
    let store = load_store(input)?;
    if store.is_empty() {
        bail!("No series found in {}", input.display());
    }
    Ok(store)
}

fn main() -> Result<()> {
    if dotenvy::from_filename(".env").is_err() {
        dotenvy::dotenv().ok();
    }

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(domain) = &cli.domain {
        config = config.with_domain(domain)?;
    }
    logging::init(&config.observability)?;

    let metrics = if cli.metrics || config.observability.metrics_enabled {
        Some(EngineMetrics::new()?)
    } else {
        None
    };

    info!(
        "pwin: domain '{}' ({} classes, k={})",
        config.domain.name,
        config.domain.alphabet.len(),
        config.domain.state.k
    );

    match cli.command {
        Commands::Table {
            input,
            horizon,
            as_of,
            format,
            output,
        } => {
            let series = load_series(&input, None)?;
            let as_of = parse_date(as_of.as_deref())?;
            let policy = config.domain.policy_for(&horizon)?;
            let pipeline = config.pipeline()?;

            let snapshot = pipeline
                .snapshot(&series, as_of, &policy)
                .with_context(|| format!("{} as of {}", series.entity(), as_of.format("%Y-%m-%d")))?;
            info!(
                "pwin: {} usable samples, {} states, current {}, window {}",
                snapshot.usable_samples(),
                snapshot.table().state_count(),
                snapshot
                    .current_state()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "undefined".to_string()),
                snapshot.quality().as_str()
            );
            if let Some(m) = &metrics {
                m.inc_snapshots();
            }

            let mut out = open_output(output.as_deref())?;
            match format {
                Format::Csv => export::write_table_csv(snapshot.table(), &mut out)?,
                Format::Json => writeln!(out, "{}", export::table_json(snapshot.table())?)?,
            }
            out.flush()?;
        }
        Commands::Query {
            input,
            horizon,
            as_of,
            outcome,
            state,
            format,
            output,
        } => {
            let store = load(&input)?;
            let as_of = parse_date(as_of.as_deref())?;
            let state = state.as_deref().map(parse_state).transpose()?;
            let runner = runner(&config, metrics.as_ref())?;
            let query = AsOfQuery::new(runner.pipeline().clone(), config.domain.policy_for(&horizon)?);

            let outcomes = runner.run_with(&store, |_, series| match &state {
                Some(state) => query.p_outcome(series, as_of, state, &outcome),
                None => query.p_current(series, as_of, &outcome),
            });
            let estimates: Vec<Estimate> = outcomes.into_iter().filter_map(|o| o.result.ok()).collect();
            write_estimates(&estimates, format, output.as_deref())?;
        }
        Commands::Snapshots {
            input,
            horizon,
            period,
            start,
            end,
            outcome,
            output,
        } => {
            let series = load_series(&input, None)?;
            let period: CalendarPeriod = period.parse()?;
            let start = parse_date(Some(&start))?;
            let end = parse_date(end.as_deref())?;
            let policy = config.domain.policy_for(&horizon)?;
            let pipeline = config.pipeline()?;
            let label = pipeline.alphabet().resolve(&outcome)?;

            let dates = rebalance_dates(&series, period, start, end);
            let history = SnapshotHistory::build(&pipeline, &series, &policy, &dates);
            if let Some(m) = &metrics {
                m.snapshots_built_total.inc_by(history.len() as f64);
            }
            if let Some((date, err)) = history.failures().iter().next_back() {
                warn!(
                    "pwin: {} of {} dates skipped, latest {}: {}",
                    history.failures().len(),
                    dates.len(),
                    date.format("%Y-%m-%d"),
                    err
                );
            }

            let estimates: Vec<Estimate> = history
                .iter()
                .filter_map(|s| s.current_estimate(label).ok())
                .collect();
            write_estimates(&estimates, Format::Csv, output.as_deref())?;
        }
        Commands::Matrix {
            input,
            as_of,
            no_threshold,
            output,
        } => {
            let store = load(&input)?;
            let as_of = parse_date(as_of.as_deref())?;
            let runner = runner(&config, metrics.as_ref())?;
            let threshold = if no_threshold {
                None
            } else {
                config.domain.threshold.as_ref()
            };

            let matrix = TrendMatrix::build(&runner, &store, as_of, &config.domain.horizons, threshold)?;
            let mut out = open_output(output.as_deref())?;
            export::write_matrix_csv(&matrix, &mut out)?;
            out.flush()?;
        }
    }

    if let Some(m) = &metrics {
        eprint!("{}", m.render());
    }
    Ok(())
}
