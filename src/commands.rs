// promptmap/src/commands.rs

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use tracing::{debug, info};

use crate::{
    aggregate::{Aggregator, CancelToken, DiagnosticSink, RunStats, TracingSink},
    config::Config,
    discover::{self, Plan},
    error::{AggregateError, UsageError},
    render::{render_with, LineOrder, RenderOptions},
    util,
};

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug, Clone)]
#[command(name = "promptmap", version)]
#[command(about = "Render a box-drawing map of a codebase's declarations", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["dir", "manifest", "records"])))]
pub struct Cli {
    /// Scan every .rs file under a directory
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Scan a Cargo package or workspace
    #[arg(long, value_name = "CARGO_TOML")]
    pub manifest: Option<PathBuf>,

    /// Aggregate pre-extracted JSONL record files
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub records: Vec<PathBuf>,

    /// Write the map here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Also list restricted and private members
    #[arg(long)]
    pub include_private: bool,

    /// List constructors (receiver-less fns returning Self)
    #[arg(long)]
    pub include_ctors: bool,

    /// Sort lines within each node by member name
    #[arg(long)]
    pub stable_lines: bool,

    /// Root name for --records (default: unnamed root)
    #[arg(long)]
    pub root_name: Option<String>,

    /// Config file (default: promptmap.toml next to the input)
    #[arg(long, env = "PROMPTMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// -v debug, -vv trace (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Effective settings after layering CLI flags over the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self, UsageError> {
        let mut config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::discover(&config_dir(cli))?,
        };
        config.analysis.include_private |= cli.include_private;
        config.analysis.include_ctors |= cli.include_ctors;
        if cli.stable_lines {
            config.render.line_order = LineOrder::Stable;
        }
        if let Some(jobs) = cli.jobs {
            config.run.jobs = jobs;
        }
        Ok(Self { config })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions { line_order: self.config.render.line_order }
    }
}

/// Directory searched for `promptmap.toml` when `--config` is absent.
fn config_dir(cli: &Cli) -> PathBuf {
    let dir = if let Some(d) = &cli.dir {
        Some(d.clone())
    } else if let Some(m) = &cli.manifest {
        m.parent().map(Path::to_path_buf)
    } else {
        cli.records.first().and_then(|r| r.parent()).map(Path::to_path_buf)
    };
    match dir {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => PathBuf::from("."),
    }
}

/// Producers for whichever input kind was given.
pub fn plan(cli: &Cli, settings: &Settings) -> Result<Plan> {
    let cfg = &settings.config;
    if let Some(dir) = &cli.dir {
        require(dir)?;
        return discover::plan_directory(dir, &cfg.scan.exclude_dirs, cfg.analysis);
    }
    if let Some(manifest) = &cli.manifest {
        require(manifest)?;
        return discover::plan_manifest(manifest, &cfg.scan.exclude_dirs, cfg.analysis);
    }
    for r in &cli.records {
        require(r)?;
    }
    Ok(discover::plan_records(&cli.records, cli.root_name.as_deref()))
}

fn require(path: &Path) -> Result<(), UsageError> {
    if path.exists() {
        Ok(())
    } else {
        Err(UsageError::MissingInput(path.to_path_buf()))
    }
}

/// Aggregate a plan on a pool of `jobs` threads and render the result.
pub fn build_map(
    plan: &Plan,
    settings: &Settings,
    cancel: &CancelToken,
    diagnostics: &dyn DiagnosticSink,
) -> Result<(String, RunStats)> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.config.run.jobs)
        .build()
        .context("building worker pool")?;

    let agg = Aggregator::new(plan.root_name.clone());
    debug!(producers = plan.producers.len(), root = %plan.root_name, "starting run");
    let stats = pool.install(|| agg.run(&plan.producers, cancel, diagnostics))?;
    info!(
        producers = stats.producers,
        succeeded = stats.succeeded,
        failed = stats.failed,
        records = stats.records,
        "run finished"
    );

    let root = agg.finish();
    Ok((render_with(&root, settings.render_options()), stats))
}

/// Parse args, run, and map the outcome to a process exit code.
pub fn run_cli(cli: &Cli, cancel: &CancelToken) -> ExitCode {
    match execute(cli, cancel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn execute(cli: &Cli, cancel: &CancelToken) -> Result<()> {
    let settings = Settings::resolve(cli)?;
    let plan = plan(cli, &settings)?;
    let (text, _stats) = build_map(&plan, &settings, cancel, &TracingSink)?;

    match &cli.out {
        Some(out) => {
            util::write_output(out, &text)?;
            println!("Wrote: {}", out.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("writing to stdout")?;
            stdout.flush().context("flushing stdout")?;
        }
    }
    Ok(())
}

/// 130 for cancellation, 2 for bad input or config, 1 for everything else.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if matches!(err.downcast_ref::<AggregateError>(), Some(AggregateError::Cancelled)) {
        EXIT_CANCELLED
    } else if err.downcast_ref::<UsageError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_FAILURE
    }
}
