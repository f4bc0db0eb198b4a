//! awf_scrape - Download one time-lapse per camera.
//!
//! This tool:
//! 1. Fetches the camera catalog
//! 2. Downloads every camera's time-lapse into `<frames_dir>/<run>/<camera>/`
//! 3. Removes night (grayscale) and undecodable frames
//! 4. Removes camera folders left empty

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use pyro_scrapper::config::{ScrapperConfig, CONFIG_ENV};
use pyro_scrapper::layout::{list_frames, remove_empty_subfolders, subdirectories};
use pyro_scrapper::pool::{log_failures, WorkerPool};
use pyro_scrapper::scrape::{remove_if_unusable, AwfClient, FrameCheck};
use pyro_scrapper::timestamp::{format_timestamp, local_now};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Download wildfire-camera time-lapses")]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Time-lapse preset, e.g. 12h or 15mn (overrides config).
    #[arg(long)]
    preset: Option<String>,

    /// Only scrape these camera ids.
    #[arg(long = "camera", value_name = "ID")]
    cameras: Vec<String>,

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

    let mut cfg = ScrapperConfig::load_from(args.config.as_deref())?;
    if let Some(preset) = args.preset {
        cfg.scrape.preset = preset;
    }
    let client = AwfClient::new(cfg.scrape.clone())?;
    let pool = WorkerPool::new(cfg.workers);

    let camera_ids = if args.cameras.is_empty() {
        let _stage = ui.stage("Fetch camera catalog");
        client.camera_ids()?
    } else {
        args.cameras.iter().map(|id| id.to_lowercase()).collect()
    };
    log::info!("{} cameras to scrape", camera_ids.len());

    let now = local_now(cfg.schedule.utc_offset);
    let run_dir = cfg.paths.frames_dir.join(format_timestamp(&now));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("create {}", run_dir.display()))?;

    {
        let _stage = ui.stage("Download time-lapses");
        let bar = ui.progress("cameras", camera_ids.len());
        let mut frames = 0;
        pool.run_with(
            camera_ids,
            |id| id.clone(),
            |id| client.scrape_camera(&id, &run_dir, now),
            |report| {
                bar.inc(1);
                match &report.result {
                    Ok(written) => frames += written.len(),
                    Err(failure) => log::warn!("{}: download skipped: {}", report.label, failure),
                }
            },
        );
        bar.finish_and_clear();
        log::info!("downloaded {} frames into {}", frames, run_dir.display());
    }

    {
        let _stage = ui.stage("Drop night frames");
        let mut images = Vec::new();
        for camera_dir in subdirectories(&run_dir)? {
            images.extend(list_frames(&camera_dir)?);
        }
        let reports = pool.run(images, |path| path.display().to_string(), |path| {
            remove_if_unusable(&path)
        });
        let removed = reports
            .iter()
            .filter(|r| matches!(r.result, Ok(FrameCheck::Grayscale | FrameCheck::Undecodable)))
            .count();
        log_failures("frame check", &reports);
        log::info!("removed {} of {} frames", removed, reports.len());
    }

    let emptied = remove_empty_subfolders(&run_dir)?;
    if emptied > 0 {
        log::info!("removed {} empty camera folders", emptied);
    }
    Ok(())
}
