//! Integration tests for the logging system

use core_runtime::logging::{
    init_logging, redact_source_url, strip_path, LogFormat, LogLevel, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_second_initialization_fails() {
    // Only one global subscriber per process; this is the only test in this
    // binary that installs one.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Error);

    assert!(init_logging(config.clone()).is_ok());
    assert!(matches!(
        init_logging(config),
        Err(Error::AlreadyInitialized(_))
    ));
}

#[test]
fn test_signed_urls_are_redacted() {
    let url = "https://cdn.example.com/live/master.m3u8?Policy=abc&Signature=def";
    let redacted = redact_source_url(url);

    assert!(redacted.starts_with("https://cdn.example.com/live/master.m3u8"));
    assert!(!redacted.contains("Signature"));
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/videos/clip.mp4"), "clip.mp4");
    assert_eq!(strip_path("D:\\media\\clip.webm"), "clip.webm");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_level_ordering() {
    assert!(LogLevel::Trace < LogLevel::Debug);
    assert!(LogLevel::Warn < LogLevel::Error);
}
