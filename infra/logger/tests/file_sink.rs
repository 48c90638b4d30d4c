use shelf_logger::{LevelFilter, LogFormat, Logger, LoggerError};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn json_file_sink_and_single_installation() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let logger = Logger::builder()
        .name("castshelf-it")
        .console(false)
        .format(LogFormat::Json)
        .level(LevelFilter::INFO)
        .directives("castshelf=info")
        .file(&log_dir, 3)
        .init()?;
    assert!(logger.writes_files());

    let second = Logger::builder().name("castshelf-again").init();
    assert!(matches!(second, Err(LoggerError::Subscriber { .. })));

    tracing::info!(owner = "alice", "cast stored");
    tracing::debug!("filtered out");

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    let contents = fs::read_to_string(log_file)?;
    let line = contents.lines().find(|l| l.contains("cast stored")).expect("event written");
    let event: serde_json::Value = serde_json::from_str(line)?;
    assert_eq!(event["fields"]["owner"], "alice");
    assert!(!contents.contains("filtered out"));

    Ok(())
}
