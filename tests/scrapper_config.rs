use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use pyro_scrapper::config::ScrapperConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PYRO_CONFIG",
        "PYRO_OUTPUT_PATH",
        "PYRO_DONE_PATH",
        "PYRO_DETECTOR_WEIGHTS",
        "PYRO_DETECTOR_CONFIDENCE",
        "PYRO_WORKERS",
        "PYRO_OCR_COMMAND",
        "PYRO_TIMELAPSE_PRESET",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_match_the_scrape_layout() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScrapperConfig::load().expect("load defaults");

    assert_eq!(cfg.paths.frames_dir, PathBuf::from("dl_frames"));
    assert_eq!(cfg.paths.split_dir, PathBuf::from("dl_frames_splited"));
    assert_eq!(cfg.paths.done_dir, PathBuf::from("done"));
    assert_eq!(cfg.paths.runs_dir, PathBuf::from("runs_awf"));
    assert_eq!(cfg.scrape.preset, "12h");
    assert_eq!(cfg.detector.backend, "yolo");
    assert_eq!(cfg.detector.confidence, 0.2);
    assert_eq!(cfg.detector.image_size, "(384, 640)");
    assert_eq!(cfg.retention.gap.num_seconds(), 900);
    assert_eq!(cfg.retention.margin.num_seconds(), 900);
    assert_eq!(cfg.retention.min_cluster_size, 2);
    assert_eq!(cfg.cameras.split.params.angle_threshold, 5.0);
    assert_eq!(cfg.cameras.split.params.static_threshold, 15.0);
    assert_eq!(cfg.cameras.split.params.min_camera_size, 4);
    assert_eq!(cfg.cameras.split.batch_size, 50);
    assert_eq!(cfg.cameras.split.probe_images, 5);
    assert!(cfg.cameras.ocr_command.is_none());
    assert_eq!(cfg.schedule.quiet_hours, vec![1, 7, 19]);
    assert_eq!(cfg.schedule.utc_offset.local_minus_utc(), -7 * 3600);
    assert_eq!(cfg.workers, 4);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "paths": {
            "frames_dir": "/mnt/awf/dl_frames",
            "done_dir": "/mnt/awf/done"
        },
        "scrape": {
            "preset": "6h",
            "timeout_secs": 30
        },
        "detector": {
            "weights": "/opt/models/smoke.onnx",
            "confidence": 0.35
        },
        "retention": {
            "gap_secs": 600,
            "margin_secs": 300,
            "min_cluster_size": 3
        },
        "cameras": {
            "ocr_command": ["awf-ocr", "--lang", "en"],
            "static_threshold": 10.0
        },
        "schedule": {
            "quiet_hours": [7, 19],
            "utc_offset_hours": -8
        },
        "workers": 2
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PYRO_CONFIG", file.path());
    std::env::set_var("PYRO_DONE_PATH", "/srv/done");
    std::env::set_var("PYRO_WORKERS", "8");
    std::env::set_var("PYRO_TIMELAPSE_PRESET", "15mn");

    let cfg = ScrapperConfig::load().expect("load config");

    assert_eq!(cfg.paths.frames_dir, PathBuf::from("/mnt/awf/dl_frames"));
    assert_eq!(cfg.paths.done_dir, PathBuf::from("/srv/done"));
    assert_eq!(cfg.paths.split_dir, PathBuf::from("dl_frames_splited"));
    assert_eq!(cfg.scrape.preset, "15mn");
    assert_eq!(cfg.scrape.timeout.as_secs(), 30);
    assert_eq!(cfg.detector.weights, PathBuf::from("/opt/models/smoke.onnx"));
    assert_eq!(cfg.detector.confidence, 0.35);
    assert_eq!(cfg.retention.gap.num_seconds(), 600);
    assert_eq!(cfg.retention.margin.num_seconds(), 300);
    assert_eq!(cfg.retention.min_cluster_size, 3);
    assert_eq!(
        cfg.cameras.ocr_command,
        Some(vec!["awf-ocr".to_string(), "--lang".to_string(), "en".to_string()])
    );
    assert_eq!(cfg.cameras.split.params.static_threshold, 10.0);
    assert_eq!(cfg.schedule.quiet_hours, vec![7, 19]);
    assert_eq!(cfg.schedule.utc_offset.local_minus_utc(), -8 * 3600);
    assert_eq!(cfg.workers, 8);

    let pipeline = cfg.pipeline();
    assert_eq!(pipeline.done_dir, PathBuf::from("/srv/done"));
    assert_eq!(pipeline.confidence, 0.35);
    assert_eq!(cfg.yolo().runs_dir, PathBuf::from("runs_awf"));

    clear_env();
}

#[test]
fn loads_toml_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
workers = 3

[paths]
split_dir = "split"

[detector]
program = "/usr/local/bin/yolo"
timeout_secs = 120
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("PYRO_OCR_COMMAND", "python3 ocr.py");
    let cfg = ScrapperConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.workers, 3);
    assert_eq!(cfg.paths.split_dir, PathBuf::from("split"));
    assert_eq!(cfg.detector.program, PathBuf::from("/usr/local/bin/yolo"));
    assert_eq!(cfg.detector.timeout.as_secs(), 120);
    assert_eq!(
        cfg.cameras.ocr_command,
        Some(vec!["python3".to_string(), "ocr.py".to_string()])
    );

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PYRO_TIMELAPSE_PRESET", "3d");
    assert!(ScrapperConfig::load().is_err());
    clear_env();

    std::env::set_var("PYRO_DETECTOR_CONFIDENCE", "1.5");
    assert!(ScrapperConfig::load().is_err());
    clear_env();

    std::env::set_var("PYRO_WORKERS", "0");
    assert!(ScrapperConfig::load().is_err());
    clear_env();

    std::env::set_var("PYRO_WORKERS", "many");
    assert!(ScrapperConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"schedule": {"quiet_hours": [25]}}"#)
        .expect("write config");
    assert!(ScrapperConfig::load_from(Some(file.path())).is_err());

    for retention in [
        r#"{"retention": {"margin_secs": 18446744073709551}}"#,
        r#"{"retention": {"gap_secs": 18446744073709551615}}"#,
        r#"{"retention": {"margin_secs": 90000}}"#,
    ] {
        let mut file = NamedTempFile::new().expect("temp config");
        std::io::Write::write_all(&mut file, retention.as_bytes()).expect("write config");
        assert!(ScrapperConfig::load_from(Some(file.path())).is_err());
    }

    let missing = std::path::Path::new("/nonexistent/pyro.json");
    assert!(ScrapperConfig::load_from(Some(missing)).is_err());

    clear_env();
}
