use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;

use live_detect::ui::UiMode;
use live_detect::Cli;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LIVE_DETECT_DEVICE",
        "LIVE_DETECT_WIDTH",
        "LIVE_DETECT_HEIGHT",
        "LIVE_DETECT_FPS",
        "LIVE_DETECT_MODEL",
        "LIVE_DETECT_IOU",
        "LIVE_DETECT_CONFIDENCE",
        "LIVE_DETECT_EXCLUDE",
        "LIVE_DETECT_SCREENSHOT_DIR",
        "LIVE_DETECT_START_DELAY",
        "LIVE_DETECT_MAX_FRAMES",
        "LIVE_DETECT_HEADLESS",
    ] {
        std::env::remove_var(key);
    }
}

fn parse(args: &[&str]) -> Cli {
    let argv = std::iter::once("live_detect").chain(args.iter().copied());
    Cli::try_parse_from(argv).expect("parse args")
}

#[test]
fn defaults_without_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = parse(&[]).into_config().expect("config");
    assert_eq!(cfg.source.device, "0");
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.model.identifier, "yolov8s.onnx");
    assert_eq!(cfg.settings.initial_threshold.value(), 0.6);
    assert_eq!(cfg.settings.screenshot_dir, std::path::PathBuf::from("."));
    assert_eq!(cfg.window_title, "People & Objects Detection");
    assert_eq!(cfg.ui, UiMode::Auto);
    assert!(!cfg.headless);
}

#[test]
fn env_overrides_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVE_DETECT_DEVICE", "stub://desk");
    std::env::set_var("LIVE_DETECT_WIDTH", "640");
    std::env::set_var("LIVE_DETECT_HEIGHT", "480");
    std::env::set_var("LIVE_DETECT_MODEL", "stub://demo");
    std::env::set_var("LIVE_DETECT_CONFIDENCE", "0.35");
    std::env::set_var("LIVE_DETECT_EXCLUDE", "2,3");
    std::env::set_var("LIVE_DETECT_SCREENSHOT_DIR", "/tmp/shots");
    std::env::set_var("LIVE_DETECT_START_DELAY", "0");
    std::env::set_var("LIVE_DETECT_MAX_FRAMES", "50");
    std::env::set_var("LIVE_DETECT_HEADLESS", "true");

    let cfg = parse(&[]).into_config().expect("config");
    clear_env();

    assert_eq!(cfg.source.device, "stub://desk");
    assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
    assert_eq!(cfg.model.identifier, "stub://demo");
    assert_eq!(cfg.settings.initial_threshold.value(), 0.35);
    assert!(cfg.settings.class_filter.is_excluded(2));
    assert!(cfg.settings.class_filter.is_excluded(3));
    assert!(!cfg.settings.class_filter.is_excluded(0));
    assert_eq!(cfg.settings.screenshot_dir, std::path::PathBuf::from("/tmp/shots"));
    assert_eq!(cfg.settings.start_delay, Duration::ZERO);
    assert_eq!(cfg.settings.max_frames, Some(50));
    assert!(cfg.headless);
}

#[test]
fn flags_take_precedence_over_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVE_DETECT_CONFIDENCE", "0.35");
    let cfg = parse(&["--confidence", "0.8"]).into_config().expect("config");
    clear_env();

    assert_eq!(cfg.settings.initial_threshold.value(), 0.8);
}

#[test]
fn invalid_threshold_from_env_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVE_DETECT_CONFIDENCE", "0.05");
    let result = parse(&[]).into_config();
    clear_env();

    let err = result.expect_err("threshold below 0.1 must fail");
    assert!(format!("{err:#}").contains("confidence"));
}

#[test]
fn exclude_list_parses_ids() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = parse(&["--exclude", " 2, 41 ,,63"]).into_config().expect("config");
    let ids: Vec<u32> = cfg.settings.class_filter.excluded().collect();
    assert_eq!(ids, vec![2, 41, 63]);
}

#[test]
fn invalid_flags_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for args in [
        &["--exclude", "person"][..],
        &["--confidence", "0.95"],
        &["--confidence", "0.0951"],
        &["--confidence", "0.9049"],
        &["--width", "0"],
        &["--max-frames", "0"],
        &["--start-delay=-1"],
        &["--iou", "0"],
        &["--model", " "],
    ] {
        assert!(parse(args).into_config().is_err(), "{:?} should be rejected", args);
    }
}
