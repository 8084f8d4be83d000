use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::config::EffectiveConfig;
use crate::core::{AuditResult, OptimizationReport, Priority};
use crate::engine::{Engine, EngineOptions};
use crate::inventory::{InventorySource, SnapshotSource};
use crate::optimize::ScanContext;
use crate::probe::{SnapshotProbe, SystemProbe};
use crate::reconcile::AuditRequest;
use crate::report::{ReportBundle, ReportWriteOutcome};
use crate::ui::UiConfig;

mod select;

#[derive(Debug, Parser)]
#[command(
    name = "winaudit",
    version,
    about = "Audit a Windows machine: essential software, optimization opportunities and reports"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare installed software against the essential-apps catalog.
    Apps(AppsArgs),
    /// Scan for startup, UI, registry, disk and network optimizations.
    Optimize(OptimizeArgs),
    /// Run both audits and write HTML/text/JSON report files.
    Report(ReportArgs),
    /// Show or apply install commands for missing apps.
    Install(InstallArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Read installed software from a JSON file instead of the host.
    #[arg(long)]
    pub inventory: Option<PathBuf>,
    /// Use this catalog file (.toml or .json) instead of the configured one.
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Read host state from a JSON snapshot instead of querying the host.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    #[arg(long)]
    pub no_cache: bool,
}

impl SourceArgs {
    fn is_offline(&self) -> bool {
        self.inventory.is_some() || self.catalog.is_some() || self.snapshot.is_some()
    }
}

#[derive(Debug, Args)]
pub struct AppsArgs {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub include_installed: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct OptimizeArgs {
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Base path; `.html`, `.txt` and `.json` are appended.
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long)]
    pub skip_apps: bool,
    #[arg(long)]
    pub skip_optimize: bool,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[arg(long)]
    pub apply: bool,
    #[arg(long)]
    pub interactive: bool,
    /// Lowest priority to include (high|medium|low).
    #[arg(long)]
    pub priority: Option<Priority>,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::platform::effective_home_dir()?;

    let env_config_path = std::env::var_os("WINAUDIT_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;

    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let dry_run = cli.dry_run || cfg.general.dry_run;
    let timeout = Duration::from_secs(cli.timeout);
    if timeout.is_zero() {
        return Err(crate::exit::invalid_args("--timeout must be greater than 0"));
    }

    let engine_for = |use_cache: bool| {
        Engine::new(
            EngineOptions {
                timeout,
                show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
                use_cache,
                persist: true,
            },
            cfg.clone(),
        )
    };

    match cli.command {
        Commands::Apps(args) => {
            let category = match args.category.as_deref() {
                Some(c) => crate::config::parse_category(c).map_err(crate::exit::invalid_args_err)?,
                None => cfg.audit.default_category,
            };
            let request = AuditRequest {
                category,
                include_installed: args.include_installed || cfg.audit.include_installed,
            };
            let engine = engine_for(!args.source.no_cache && !args.source.is_offline());
            let result = run_audit(&engine, &request, &args.source)?;
            if cli.json {
                write_json(&result)?;
            } else {
                crate::ui::print_audit(&result, &ui_cfg);
            }
        }
        Commands::Optimize(args) => {
            let engine = engine_for(!args.no_cache && args.snapshot.is_none());
            let report = run_optimize(&engine, args.snapshot.as_deref())?;
            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_optimization(&report, &ui_cfg);
            }
        }
        Commands::Report(args) => {
            let audit_apps = !args.skip_apps && cfg.general.mode.runs_apps();
            let scan_optimizations = !args.skip_optimize && cfg.general.mode.runs_optimize();
            if !audit_apps && !scan_optimizations {
                return Err(crate::exit::invalid_args(format!(
                    "report: nothing to run (mode={}, --skip-apps={}, --skip-optimize={})",
                    cfg.general.mode, args.skip_apps, args.skip_optimize
                )));
            }
            let formats = cfg.report.formats();
            if formats.is_empty() {
                return Err(crate::exit::invalid_args(
                    "report: every output format is disabled in [report]",
                ));
            }

            let engine = engine_for(!args.source.no_cache && !args.source.is_offline());
            let mut bundle = ReportBundle::default();
            if audit_apps {
                let request = AuditRequest {
                    category: cfg.audit.default_category,
                    include_installed: true,
                };
                bundle.audit = Some(run_audit(&engine, &request, &args.source)?);
            }
            if scan_optimizations {
                bundle.optimization = Some(run_optimize(&engine, args.source.snapshot.as_deref())?);
            }

            let outcome = crate::report::write_reports(&args.out, &bundle, &formats);
            if cli.json {
                write_json(&ReportWriteSummary::from(&outcome))?;
            } else if !ui_cfg.quiet {
                for path in &outcome.written {
                    println!("written: {}", path.display());
                }
                for (path, err) in &outcome.failed {
                    eprintln!("warning: failed to write {}: {err}", path.display());
                }
            }
        }
        Commands::Install(args) => {
            if args.apply && cli.json {
                return Err(crate::exit::invalid_args(
                    "install --apply cannot be combined with --json",
                ));
            }
            if args.interactive && !args.apply {
                return Err(crate::exit::invalid_args(
                    "install: --interactive requires --apply",
                ));
            }

            if args.apply && !dry_run && !(ui_cfg.stdin_is_tty && ui_cfg.stdout_is_tty) {
                return Err(crate::exit::invalid_args(
                    "install --apply requires a TTY (stdin + stdout)",
                ));
            }

            let engine = engine_for(!args.source.no_cache && !args.source.is_offline());
            let request = AuditRequest {
                category: cfg.audit.default_category,
                include_installed: false,
            };
            let audit = run_audit(&engine, &request, &args.source)?;
            let min_priority = args.priority.unwrap_or(Priority::High);
            let mut actions = crate::install::plan(&audit, min_priority);

            if !args.apply {
                if cli.json {
                    write_json(&actions)?;
                } else {
                    crate::ui::print_install_plan(&actions, &ui_cfg);
                }
                return Ok(());
            }

            actions.retain(crate::install::is_allowlisted);
            if actions.is_empty() {
                if !ui_cfg.quiet {
                    eprintln!("No app can be installed automatically.");
                }
                return Ok(());
            }

            if dry_run {
                if !ui_cfg.quiet {
                    for action in &actions {
                        if let Some(cmdline) = action.cmdline() {
                            println!("dry-run: would run `{cmdline}`");
                        }
                    }
                }
                return Ok(());
            }

            crate::ui::print_install_plan(&actions, &ui_cfg);
            if args.interactive {
                match select::prompt_app_selection(actions.len())
                    .map_err(crate::exit::invalid_args_err)?
                {
                    select::Selection::None => {
                        if !ui_cfg.quiet {
                            eprintln!("Cancelled.");
                        }
                        return Ok(());
                    }
                    select::Selection::All => {}
                    select::Selection::Indices(indices) => {
                        actions = indices.into_iter().map(|i| actions[i].clone()).collect();
                    }
                }
            }

            if !confirm_exact(
                &format!(
                    "About to install {} app(s). Type 'install' to continue: ",
                    actions.len()
                ),
                "install",
            )? {
                if !ui_cfg.quiet {
                    eprintln!("Cancelled.");
                }
                return Ok(());
            }

            let started_at = time::OffsetDateTime::now_utc();
            let outcome = crate::install::apply(&actions, timeout.saturating_mul(20));
            let finished_at = time::OffsetDateTime::now_utc();
            let log_path =
                crate::logs::write_install_log(engine.data_dir(), started_at, finished_at, &outcome)
                    .map_err(|e| {
                        anyhow::anyhow!(
                            "install: finished, but the run log could not be written: {e}"
                        )
                    })?;

            crate::ui::print_install_outcome(&outcome, &ui_cfg);
            let log_hint = display_under(&log_path, &home_dir);
            if !ui_cfg.quiet {
                println!("log: {log_hint}");
            }
            if outcome.failed_count() > 0 {
                return Err(crate::exit::external_cmd(format!(
                    "install: {} of {} installs failed\nlog: {log_hint}",
                    outcome.failed_count(),
                    outcome.attempts.len()
                )));
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "winaudit", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                show_config(&cfg, cli.json)?;
            } else if !ui_cfg.quiet {
                eprintln!("config: use `winaudit config --show`");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = std::env::var("WINAUDIT_LOG")
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn inventory_sources(engine: &Engine, source: &SourceArgs) -> Vec<Box<dyn InventorySource>> {
    match &source.inventory {
        Some(path) => vec![Box::new(SnapshotSource::new(path.clone()))],
        None => crate::inventory::host_sources(engine.timeout()),
    }
}

fn load_probe(engine: &Engine, snapshot: Option<&Path>) -> Result<Box<dyn SystemProbe>> {
    match snapshot {
        Some(path) => Ok(Box::new(
            SnapshotProbe::load(path).map_err(crate::exit::invalid_args_err)?,
        )),
        None => Ok(Box::new(engine.host_probe())),
    }
}

fn run_audit(engine: &Engine, request: &AuditRequest, source: &SourceArgs) -> Result<AuditResult> {
    let sources = inventory_sources(engine, source);
    let catalog = engine.catalog(source.catalog.clone());
    let probe = load_probe(engine, source.snapshot.as_deref())?;
    engine
        .audit_software(request, &sources, catalog.as_ref(), probe.as_ref())
        .map_err(crate::exit::audit_failed_err)
}

fn run_optimize(engine: &Engine, snapshot: Option<&Path>) -> Result<OptimizationReport> {
    let report = match snapshot {
        Some(path) => {
            let probe = SnapshotProbe::load(path).map_err(crate::exit::invalid_args_err)?;
            let ctx = ScanContext {
                probe: &probe,
                temp_dirs: snapshot_temp_dirs(&probe),
            };
            engine.optimize(&ctx)
        }
        None => {
            let probe = engine.host_probe();
            engine.optimize(&ScanContext::new(&probe))
        }
    };
    report.map_err(crate::exit::audit_failed_err)
}

/// A snapshot carries its own temp directory sizes; those paths are the ones
/// to check rather than this machine's.
fn snapshot_temp_dirs(probe: &SnapshotProbe) -> Vec<PathBuf> {
    probe
        .dir_sizes
        .as_ref()
        .map(|m| m.keys().map(PathBuf::from).collect())
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct ReportWriteSummary {
    written: Vec<String>,
    failed: Vec<ReportWriteFailure>,
}

#[derive(Debug, Serialize)]
struct ReportWriteFailure {
    path: String,
    error: String,
}

impl From<&ReportWriteOutcome> for ReportWriteSummary {
    fn from(outcome: &ReportWriteOutcome) -> Self {
        Self {
            written: outcome
                .written
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            failed: outcome
                .failed
                .iter()
                .map(|(p, e)| ReportWriteFailure {
                    path: p.display().to_string(),
                    error: e.clone(),
                })
                .collect(),
        }
    }
}

fn show_config(cfg: &EffectiveConfig, json: bool) -> Result<()> {
    if json {
        write_json(cfg)
    } else {
        println!("{}", toml::to_string_pretty(cfg)?);
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn display_under(path: &Path, home_dir: &Path) -> String {
    path.strip_prefix(home_dir)
        .map(|p| format!("~/{}", p.display()))
        .unwrap_or_else(|_| path.display().to_string())
}

fn confirm_exact(prompt: &str, expected: &str) -> Result<bool> {
    use std::io::{BufRead, Write};

    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    let mut input = String::new();
    let mut stdin = std::io::stdin().lock();
    let n = stdin.read_line(&mut input)?;
    if n == 0 {
        return Ok(false);
    }
    Ok(input.trim() == expected)
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        "powershell" | "pwsh" => Ok(clap_complete::Shell::PowerShell),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish|powershell)"
        ))),
    }
}
