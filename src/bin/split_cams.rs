//! split_cams - Separate panning cameras into one folder per heading.
//!
//! For every complete download day under `frames_dir`:
//! 1. Probe the first frames of each camera folder for the printed pan angle
//! 2. Move static cameras whole under `cam_00`
//! 3. Cluster the angles of panning cameras and move each heading to `cam_NN`
//! 4. Drop day folders left empty
//!
//! Folders whose OCR call fails stay in place for the next run.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use pyro_scrapper::cameras::{
    is_complete_day, split_camera_folder, AngleReader, CommandAngleReader, SplitOutcome,
};
use pyro_scrapper::config::{ScrapperConfig, CONFIG_ENV};
use pyro_scrapper::layout::{camera_folders, day_folders, remove_empty_subfolders};
use pyro_scrapper::timestamp::local_now;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Split panning cameras by heading")]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Also split the current (still downloading) day.
    #[arg(long)]
    include_today: bool,

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
    let command = cfg.cameras.ocr_command.clone().ok_or_else(|| {
        anyhow!("an OCR command is required (cameras.ocr_command or PYRO_OCR_COMMAND)")
    })?;
    let (program, ocr_args) = command
        .split_first()
        .ok_or_else(|| anyhow!("cameras.ocr_command must name a program"))?;
    let mut reader = CommandAngleReader::new(program, ocr_args.to_vec(), cfg.cameras.ocr_timeout);

    let today = local_now(cfg.schedule.utc_offset).date();
    let mut folders = Vec::new();
    for day in day_folders(&cfg.paths.frames_dir)? {
        folders.extend(
            camera_folders(&day)?
                .into_iter()
                .filter(|folder| args.include_today || is_complete_day(folder, today)),
        );
    }
    log::info!("{} camera folders to split", folders.len());

    {
        let _stage = ui.stage("Split cameras");
        let bar = ui.progress("folders", folders.len());
        let (mut fixed, mut rotating, mut failed) = (0, 0, 0);
        for folder in &folders {
            let outcome =
                split_camera_folder(folder, &cfg.paths.split_dir, &mut reader, &cfg.cameras.split);
            match outcome {
                Ok(SplitOutcome::Static { .. }) => fixed += 1,
                Ok(SplitOutcome::Rotating { .. }) => rotating += 1,
                Ok(SplitOutcome::Empty) => {}
                Err(err) => {
                    failed += 1;
                    log::error!("{}: split failed: {:#}", folder, err);
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        log::info!(
            "{} static, {} rotating, {} failed (left for next run)",
            fixed,
            rotating,
            failed
        );
    }
    reader.shutdown();

    let removed = remove_empty_subfolders(&cfg.paths.frames_dir)?;
    if removed > 0 {
        log::info!("removed {} empty day folders", removed);
    }
    Ok(())
}
