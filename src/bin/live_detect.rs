//! live_detect - interactive people and object detection from a webcam
//!
//! Loads the detector, opens the camera and a window, then runs the
//! detection loop until the user quits, the stream ends or Ctrl-C arrives.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use live_detect::ui::Ui;
use live_detect::{
    load_detector, open_display, source_for, Cli, DetectionLoop, SessionSummary, StopReason,
};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => {
            if summary.stop_reason == StopReason::Interrupted {
                println!();
                println!("Interrupted by user. Exiting...");
            }
            print_statistics(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("An error occurred: {:#}", err);
            println!();
            println!("Troubleshooting:");
            println!("   1. Make sure camera is connected");
            println!("   2. Close other apps using the camera");
            println!("   3. Check the model path and that the binary was built with the backend features it needs");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<SessionSummary> {
    let config = cli.into_config()?;
    let ui = Ui::for_stderr(config.ui);

    let detector = {
        let _stage = ui.stage("load detector");
        load_detector(&config.model)?
    };
    log::info!(
        "detector {} loaded with {} classes",
        detector.name(),
        detector.class_names().len()
    );

    let source = source_for(config.source.clone())?;
    let display = open_display(config.headless, &config.window_title);

    let detection = {
        let _stage = ui.stage("open camera");
        DetectionLoop::initialize(source, detector, display, config.settings)?
    };

    // Until here Ctrl-C keeps its default behaviour and ends the process at once.
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("Ctrl-C handler not installed: {}", err);
    }
    let mut detection = detection.with_interrupt_flag(interrupted);

    let outcome = detection.run();
    let summary = detection.shutdown();
    outcome?;
    Ok(summary)
}

fn print_statistics(summary: &SessionSummary) {
    println!();
    println!("Statistics:");
    println!("   Total frames: {}", summary.frames);
    println!("   Average FPS: {:.1}", summary.average_fps);
    if summary.screenshots_saved > 0 {
        println!("   Screenshots saved: {}", summary.screenshots_saved);
    }
    println!();
    println!("Object detection finished!");
}
