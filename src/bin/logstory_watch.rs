use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use logstory::config::Config;
use logstory::detection::StreamingDetector;
use logstory::input::FileTailer;
use logstory::output::{OutputFormat, OutputHandler};

/// Follow an auth log and report bursts as they happen
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting logstory watcher...");

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load_or_default(&config_path)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut output_handler = OutputHandler::new(
        OutputFormat::parse(&config.output.format),
        config.output.file_path.clone(),
    )?;

    let mut detector = StreamingDetector::new(config.detection.params());
    let mut tailer = if config.watch.from_start {
        FileTailer::from_start(config.watch.file_path.clone())
    } else {
        FileTailer::new(config.watch.file_path.clone())
    };
    tailer.initialize()?;

    let poll = Duration::from_millis(config.watch.poll_interval_ms);
    log::info!("Watching {:?}. Press Ctrl+C to stop.", config.watch.file_path);

    while running.load(Ordering::SeqCst) {
        if !tailer.is_valid() {
            log::warn!("{:?} is no longer readable", config.watch.file_path);
            std::thread::sleep(poll);
            continue;
        }

        match tailer.read_events() {
            Ok(events) => {
                for event in &events {
                    for finding in detector.observe(event) {
                        log::warn!("FINDING: {}", finding);
                        output_handler.write_finding(&finding)?;
                    }
                }
            }
            Err(e) => log::error!("Error reading from file: {}", e),
        }

        detector.prune_idle();
        std::thread::sleep(poll);
    }

    output_handler.flush()?;
    log::info!(
        "Watcher stopped after {} timed event(s), {} byte(s) read, {} key(s) still in window",
        detector.events_seen(),
        tailer.position(),
        detector.tracked_keys()
    );
    Ok(())
}
