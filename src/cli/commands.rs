//! Command handlers for the ytdlp-queue CLI
//!
//! This module implements the command handlers that turn CLI arguments into
//! coordinator calls. Every command opens the persisted queue; only `run`
//! (or `autostart` after adding jobs) starts downloads and keeps the process
//! alive until the queue is idle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::coordinator::{
    create_shutdown_channel, spawn_signal_listener, Board, CoordinatorConfig, DownloadCoordinator,
    JobSnapshot,
};
use crate::app::format::ClipRange;
use crate::app::models::{validate_url, JobId, JobOptions};
use crate::app::queue::{QueueManager, QueueStats, QueueStore};
use crate::app::runner::ProcessRunner;
use crate::app::tools::tool_version;
use crate::cli::progress::{list_row, ProgressConfig, ProgressDisplay};
use crate::cli::{AddArgs, ClipArgs, Commands, ConfigAction, GlobalArgs, JobArgs};
use crate::config::{default_config_path, AppConfig};
use crate::errors::{AppError, ConfigError, QueueError, Result};

/// Settings resolved for one invocation
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: AppConfig,
    /// File the settings came from (or will be written to)
    pub path: PathBuf,
    /// A default file was written on this run
    pub created: bool,
    /// Why the file was ignored, if it was
    pub problem: Option<ConfigError>,
}

/// Everything a command handler needs
#[derive(Debug)]
pub struct CommandContext {
    pub settings: AppConfig,
    pub config_path: PathBuf,
    pub quiet: bool,
}

/// Resolve and read the settings file
///
/// An explicit `--config` file must exist. The default file is created on
/// first run. An unreadable or invalid file is reported in
/// [`LoadedSettings::problem`] and replaced by defaults.
pub async fn load_settings(global: &GlobalArgs) -> Result<LoadedSettings> {
    let mut created = false;
    let mut problem = None;

    let path = match &global.config {
        Some(path) => {
            if !path.exists() {
                return Err(AppError::generic(format!(
                    "Specified config file not found: {}",
                    path.display()
                )));
            }
            path.clone()
        }
        None => {
            let path = default_config_path()?;
            match AppConfig::initialize_first_run(&path).await {
                Ok(written) => created = written,
                Err(e) => problem = Some(e),
            }
            path
        }
    };

    let settings = if path.exists() {
        match AppConfig::load_from_file(&path).await {
            Ok(settings) => settings,
            Err(e) => {
                problem = Some(e);
                AppConfig::default()
            }
        }
    } else {
        AppConfig::default()
    };

    Ok(LoadedSettings {
        settings,
        path,
        created,
        problem,
    })
}

/// Dispatch a parsed command
pub async fn execute(command: Commands, context: &CommandContext) -> Result<()> {
    match command {
        Commands::Config(args) => handle_config(args.action, context).await,
        Commands::Tools => handle_tools(context).await,
        Commands::Info { url } => handle_info(&url, context).await,
        Commands::List => handle_list(context).await,
        command => {
            let concurrency = match &command {
                Commands::Run { concurrency } => *concurrency,
                _ => None,
            };
            let coordinator = open_coordinator(&context.settings, concurrency).await?;
            let result = execute_on_queue(command, &coordinator, context).await;
            coordinator.close().await;
            result
        }
    }
}

/// Commands that edit or run the queue; the caller owns the queue lock
async fn execute_on_queue(
    command: Commands,
    coordinator: &DownloadCoordinator,
    context: &CommandContext,
) -> Result<()> {
    match command {
        Commands::Add(args) => handle_add(args, coordinator, context).await,
        Commands::Clip(args) => handle_clip(args, coordinator, context).await,
        Commands::Import { file } => handle_import(&file, coordinator, context).await,
        Commands::Run { .. } => run_queue(coordinator, context.quiet).await,
        Commands::Cancel { id } => {
            let job = coordinator.cancel(&JobId::new(id)).await?;
            println!("{}  {}", job.id, job.status);
            Ok(())
        }
        Commands::Pause { id } => {
            let job = coordinator.pause(&JobId::new(id)).await?;
            println!("{}  {}", job.id, job.status);
            Ok(())
        }
        Commands::Resume { id } => {
            let job = coordinator.resume(&JobId::new(id)).await?;
            println!("{}  {}", job.id, job.status);
            Ok(())
        }
        Commands::Retry { id } => {
            let new_id = coordinator.retry(&JobId::new(id.clone())).await?;
            println!("Queued {} as a retry of {}", new_id, id);
            autostart(coordinator, context).await
        }
        Commands::Priority { id, priority } => {
            let job = coordinator.reprioritize(&JobId::new(id), priority).await?;
            println!("{}  priority {}", job.id, job.priority);
            Ok(())
        }
        Commands::Remove { id } => {
            let job = coordinator.remove(&JobId::new(id)).await?;
            println!("Removed {}  {}", job.id, job.display_name());
            Ok(())
        }
        Commands::Clear => {
            let removed = coordinator.clear_finished().await;
            println!("Removed {} finished job(s)", removed);
            Ok(())
        }
        Commands::List
        | Commands::Config(_)
        | Commands::Tools
        | Commands::Info { .. } => Err(AppError::generic("command does not edit the queue")),
    }
}

/// Build the coordinator over the persisted queue
///
/// Fails with a queue-in-use error while another process owns the queue file.
pub async fn open_coordinator(
    settings: &AppConfig,
    concurrency: Option<usize>,
) -> Result<DownloadCoordinator> {
    let (mut queue_config, runner_config, coordinator_config, tools) = settings.to_runtime_config();
    if let Some(limit) = concurrency {
        queue_config = queue_config.with_concurrency(limit);
    }

    let queue_file = settings.queue_file()?;
    debug!("Using queue file {}", queue_file.display());

    let runner = Arc::new(ProcessRunner::new(tools, runner_config));
    let queue = QueueManager::open(queue_config, runner, QueueStore::new(queue_file)).await?;
    Ok(DownloadCoordinator::new(queue, coordinator_config))
}

async fn handle_add(
    args: AddArgs,
    coordinator: &DownloadCoordinator,
    context: &CommandContext,
) -> Result<()> {
    let mut options = job_options(&args.job, coordinator.config())?;
    if let Some(start) = &args.clip_start {
        options = options.with_clip(ClipRange::parse(start, args.clip_end.as_deref())?);
    }

    let mut added = Vec::new();
    for url in &args.urls {
        match coordinator
            .submit_with_priority(url, Some(options.clone()), args.job.priority)
            .await
        {
            Ok(id) => {
                if args.title.is_some() {
                    coordinator.rename(&id, args.title.clone()).await?;
                }
                println!("Added {}  {}", id, url);
                added.push(id);
            }
            Err(e) => {
                warn!("Rejected {}: {}", url, e);
                eprintln!("Rejected {}: {}", url, e);
            }
        }
    }

    if added.is_empty() {
        return Err(AppError::generic("No URLs were added"));
    }
    name_jobs(coordinator, &added, context).await;
    autostart(coordinator, context).await
}

async fn handle_clip(
    args: ClipArgs,
    coordinator: &DownloadCoordinator,
    context: &CommandContext,
) -> Result<()> {
    let options = job_options(&args.job, coordinator.config())?;
    let clip = ClipRange::parse(&args.start, args.end.as_deref())?;

    let id = coordinator
        .submit_with_priority(&args.url, Some(options.with_clip(clip.clone())), args.job.priority)
        .await?;
    println!("Added {}  {} [{}]", id, args.url, clip);
    name_jobs(coordinator, &[id], context).await;
    autostart(coordinator, context).await
}

async fn handle_import(
    file: &Path,
    coordinator: &DownloadCoordinator,
    context: &CommandContext,
) -> Result<()> {
    let report = coordinator.import_file(file).await?;

    for line in &report.rejected {
        eprintln!("line {}: {} ({})", line.line, line.text, line.reason);
    }
    println!("{}: {}", file.display(), report.summary());

    if report.added.is_empty() {
        return Ok(());
    }
    name_jobs(coordinator, &report.added, context).await;
    autostart(coordinator, context).await
}

/// Fill in titles of new jobs when the settings ask for it
async fn name_jobs(coordinator: &DownloadCoordinator, ids: &[JobId], context: &CommandContext) {
    if !context.settings.download.fetch_titles {
        return;
    }
    let named = coordinator.fill_titles(ids).await;
    debug!("Named {}/{} new job(s)", named, ids.len());
}

async fn handle_info(url: &str, context: &CommandContext) -> Result<()> {
    validate_url(url)?;
    let (_, runner_config, _, tools) = context.settings.to_runtime_config();
    let info = ProcessRunner::new(tools, runner_config).tool_info(url).await?;
    println!("{}", info.summary());
    Ok(())
}

async fn handle_list(context: &CommandContext) -> Result<()> {
    let (jobs, stats) = match open_coordinator(&context.settings, None).await {
        Ok(coordinator) => {
            let listing = (coordinator.snapshots().await, coordinator.stats().await);
            coordinator.close().await;
            listing
        }
        Err(AppError::Queue(QueueError::InUse { path })) => {
            // Read-only view of what the owning process last saved
            eprintln!("Queue is in use by another process; showing its last saved state");
            let records = QueueStore::new(path).load_or_empty().await;
            let stats = QueueStats::from_records(&records, true);
            (records.iter().map(JobSnapshot::from).collect(), stats)
        }
        Err(e) => return Err(e),
    };

    if jobs.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    let width = ProgressConfig::default().max_title_width;
    println!(
        "{:<8}  {:>4}  {:<21}  {:>6}  {:<width$}  DETAIL",
        "ID",
        "PRIO",
        "STATUS",
        "DONE",
        "TITLE",
        width = width
    );
    for job in &jobs {
        println!("{}", list_row(job, width));
    }
    println!("\n{}", stats);
    Ok(())
}

async fn handle_config(action: ConfigAction, context: &CommandContext) -> Result<()> {
    let path = &context.config_path;
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", context.settings.to_toml()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Set { key, value } => {
            let mut settings = context.settings.clone();
            settings.set(&key, &value)?;
            settings.save(path).await?;
            info!("Set {} = {}", key, value);
            println!("{} = {}", key, value);
        }
        ConfigAction::Reset => {
            AppConfig::reset(path).await?;
            println!("Restored defaults in {}", path.display());
        }
    }
    Ok(())
}

async fn handle_tools(context: &CommandContext) -> Result<()> {
    let (_, runner_config, _, tools) = context.settings.to_runtime_config();

    match tools.locate_ytdlp() {
        Ok(path) => {
            let version = tool_version(&path, "--version")
                .await
                .unwrap_or_else(|e| e.to_string());
            println!("yt-dlp:  {} ({})", path.display(), version);
        }
        Err(e) => println!("yt-dlp:  {}", e),
    }

    match tools.locate_ffmpeg() {
        Some(path) => {
            let version = tool_version(&path, "-version")
                .await
                .unwrap_or_else(|e| e.to_string());
            println!("ffmpeg:  {} ({})", path.display(), version);
        }
        None => println!("ffmpeg:  not found (merging and audio extraction will fail)"),
    }

    println!("output:  {}", runner_config.output_dir.display());
    Ok(())
}

/// Run the queue right away when the settings ask for it
async fn autostart(coordinator: &DownloadCoordinator, context: &CommandContext) -> Result<()> {
    if context.settings.queue.autostart {
        run_queue(coordinator, context.quiet).await
    } else {
        Ok(())
    }
}

/// Start scheduling and display progress until idle or interrupted
///
/// On Ctrl-C or SIGTERM running jobs are stopped and returned to the queue
/// so the next `run` picks them up again.
pub async fn run_queue(coordinator: &DownloadCoordinator, quiet: bool) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();
    let listener = spawn_signal_listener(shutdown_tx);

    let mut display = ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: !quiet,
        ..Default::default()
    });
    let mut board = coordinator.watch();
    let mut ticker = tokio::time::interval(display.update_interval());

    info!("Starting queue ({})", coordinator.stats().await);
    coordinator.start_all().await;

    let idle = coordinator.wait_idle();
    tokio::pin!(idle);
    let interrupted = loop {
        tokio::select! {
            _ = &mut idle => break false,
            _ = shutdown_rx.recv() => break true,
            _ = ticker.tick() => display.render(&board.borrow_and_update()),
        }
    };
    listener.abort();

    if interrupted {
        eprintln!("Stopping downloads...");
        coordinator.shutdown().await;
    } else {
        coordinator.stop_all().await;
    }

    let notice = board.borrow().notice.clone();
    let final_board = Board {
        jobs: coordinator.snapshots().await,
        stats: coordinator.stats().await,
        notice,
    };
    display.finish(&final_board);
    Ok(())
}

/// Options for new jobs: settings defaults overridden by flags
pub fn job_options(args: &JobArgs, defaults: &CoordinatorConfig) -> Result<JobOptions> {
    let mut options = defaults.default_options();
    if let Some(format) = args.format {
        options.format = format;
    }
    if let Some(quality) = args.quality {
        options.quality = quality;
    }
    if let Some(dir) = &args.output_dir {
        let dir = if dir.is_relative() {
            std::env::current_dir()?.join(dir)
        } else {
            dir.clone()
        };
        options.output_dir = Some(dir);
    }
    Ok(options)
}
