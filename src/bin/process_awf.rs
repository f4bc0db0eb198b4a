//! process_awf - Detection loop over downloaded camera folders.
//!
//! This daemon:
//! 1. Picks the oldest day folder under the input directory
//! 2. Runs the smoke detector on each camera folder, in parallel
//! 3. Archives frames near sustained detections into `done/`
//! 4. Removes processed folders, then moves on to the next day
//!
//! During quiet hours (when the download job runs) folders are deferred and
//! the loop sleeps. Ctrl-C stops the loop between batches.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pyro_scrapper::config::{ScrapperConfig, CONFIG_ENV};
use pyro_scrapper::detect::{DetectorRegistry, YoloCliBackend};
use pyro_scrapper::layout::{camera_folders, day_folders, prune_empty_tree, CameraFolder};
use pyro_scrapper::pipeline::Pipeline;
use pyro_scrapper::pool::WorkerPool;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect smoke and archive frames near detections")]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Folder of day folders to process (defaults to the split output).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Detector backend name (defaults to the configured backend).
    #[arg(long)]
    detector: Option<String>,

    /// Process what is there once, then exit.
    #[arg(long)]
    once: bool,

    /// UI mode for stderr progress (auto|plain|pretty).
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = ScrapperConfig::load_from(args.config.as_deref())?;
    let input = args.input.unwrap_or_else(|| cfg.paths.split_dir.clone());

    let mut registry = DetectorRegistry::new();
    registry.register(YoloCliBackend::new(cfg.yolo()));
    let detector_name = args.detector.unwrap_or_else(|| cfg.detector.backend.clone());
    let mut detector = {
        let _stage = ui.stage("Load detector");
        registry.select(Some(detector_name.as_str()))?
    };

    let settings = cfg.pipeline();
    let pool = WorkerPool::new(cfg.workers);
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    log::info!(
        "processing {} with {} workers, archives to {}",
        input.display(),
        pool.workers(),
        settings.done_dir.display()
    );

    while !shutdown.load(Ordering::SeqCst) {
        let Some((day, folders)) = next_day(&input)? else {
            if args.once {
                break;
            }
            log::debug!("nothing to process, waiting");
            sleep_unless(&shutdown, cfg.schedule.poll_interval);
            continue;
        };

        let summary = {
            let _stage = ui.stage(&format!("Process {}", day.display()));
            let bar = ui.progress("folders", folders.len());
            let pipeline = Pipeline::new(detector.as_ref(), &settings);
            pipeline.run_batch(folders, &pool, |_| bar.inc(1))
        };
        log::info!(
            "{}: {} archived, {} empty, {} deferred, {} failed",
            day.display(),
            summary.archived,
            summary.empty,
            summary.deferred,
            summary.failed
        );
        prune_empty_tree(&day)?;

        if summary.deferred > 0 {
            if args.once {
                break;
            }
            log::info!("quiet hours, pausing");
            sleep_unless(&shutdown, cfg.schedule.poll_interval);
        } else if summary.failed > 0 && summary.archived + summary.empty == 0 {
            if args.once {
                break;
            }
            log::warn!("no folder of {} could be processed, retrying later", day.display());
            sleep_unless(&shutdown, cfg.schedule.poll_interval);
        }
    }

    detector.shutdown();
    log::info!("process_awf stopped");
    Ok(())
}

/// Oldest day folder that still holds camera folders. Empty day folders met
/// on the way are removed.
fn next_day(input: &Path) -> Result<Option<(PathBuf, Vec<CameraFolder>)>> {
    for day in day_folders(input)? {
        let folders = camera_folders(&day)?;
        if folders.is_empty() {
            prune_empty_tree(&day)?;
            continue;
        }
        return Ok(Some((day, folders)));
    }
    Ok(None)
}

fn sleep_unless(shutdown: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(Duration::from_secs(1)));
    }
}
