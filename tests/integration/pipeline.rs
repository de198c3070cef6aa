// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration Tests: Emission Pipeline
//!
//! Filtering, fallback to DEFAULT, shared file sinks and history, driven only
//! through the public API.

use dispatch_log::logging::{
    Level, LoggingContext, LoggingSettings, SourceUpdate, WriteFailurePolicy, ALL_LEVELS,
    SOURCE_DEFAULT, SOURCE_LOGGING,
};
use dispatch_log::{log_error, log_info};
use std::path::Path;
use std::sync::Arc;

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// DEFAULT redirected to a file, timestamps off so lines are comparable
fn context_with_default_file(path: &Path) -> LoggingContext {
    let ctx = LoggingContext::initialize();
    ctx.apply_update(
        &SourceUpdate::new(SOURCE_DEFAULT)
            .output(path_str(path))
            .timestamp(false),
    )
    .unwrap();
    ctx
}

#[test]
fn test_initial_default_filters_below_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.log");
    let ctx = context_with_default_file(&path);
    let src = ctx.source("X");

    for level in [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Notice,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ] {
        ctx.emit(&src, level, None, None, format_args!("{}", level));
    }

    assert_eq!(
        read_lines(&path),
        vec![
            "X (info) info",
            "X (notice) notice",
            "X (warning) warning",
            "X (error) error",
            "X (critical) critical",
        ]
    );
    let stats = ctx.source_stats("X");
    assert_eq!(stats.trace_count, 1);
    assert_eq!(stats.debug_count, 1);
    assert_eq!(ctx.history_len(), 5);
}

#[test]
fn test_none_level_emits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.log");
    let ctx = context_with_default_file(&path);
    ctx.apply_update(&SourceUpdate::new("X").enable("trace+")).unwrap();
    let src = ctx.source("X");
    ctx.emit(&src, Level::None, None, None, format_args!("nothing"));
    assert!(read_lines(&path).is_empty());
    assert_eq!(ctx.history_len(), 0);
    assert_eq!(ctx.source_settings("X").mask, Some(ALL_LEVELS));
}

#[test]
fn test_two_sources_share_one_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let default_path = dir.path().join("default.log");
    let shared_path = dir.path().join("shared.log");
    let ctx = context_with_default_file(&default_path);

    for module in ["A", "B"] {
        ctx.apply_update(&SourceUpdate::new(module).output(path_str(&shared_path)))
            .unwrap();
    }
    assert_eq!(ctx.sink_refcount(path_str(&shared_path)), Some(2));

    let a = ctx.source("A");
    let b = ctx.source("B");
    ctx.emit(&a, Level::Info, None, None, format_args!("from a"));
    ctx.emit(&b, Level::Warning, None, None, format_args!("from b"));
    assert_eq!(read_lines(&shared_path), vec!["A (info) from a", "B (warning) from b"]);
    assert!(read_lines(&default_path).is_empty());

    // Moving A away keeps the sink open for B
    ctx.apply_update(&SourceUpdate::new("A").output("stdout")).unwrap();
    assert_eq!(ctx.sink_refcount(path_str(&shared_path)), Some(1));
    ctx.reset_source("B");
    assert_eq!(ctx.sink_refcount(path_str(&shared_path)), None);
    assert!(!ctx.sink_names().contains(&path_str(&shared_path).to_string()));
}

#[test]
fn test_released_file_sink_reopens_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let default_path = dir.path().join("default.log");
    let file_path = dir.path().join("cycle.log");
    let ctx = context_with_default_file(&default_path);

    ctx.apply_update(&SourceUpdate::new("A").output(path_str(&file_path)))
        .unwrap();
    let a = ctx.source("A");
    ctx.emit(&a, Level::Info, None, None, format_args!("before"));
    ctx.reset_source("A");
    assert_eq!(ctx.sink_refcount(path_str(&file_path)), None);

    // Emits now follow DEFAULT
    ctx.emit(&a, Level::Info, None, None, format_args!("between"));
    assert_eq!(read_lines(&default_path), vec!["A (info) between"]);

    ctx.apply_update(&SourceUpdate::new("A").output(path_str(&file_path)))
        .unwrap();
    ctx.emit(&a, Level::Info, None, None, format_args!("after"));
    assert_eq!(read_lines(&file_path), vec!["A (info) before", "A (info) after"]);
}

#[test]
fn test_exact_and_at_or_above_masks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mask.log");
    let ctx = context_with_default_file(&path);
    ctx.apply_update(&SourceUpdate::new("M").enable("trace:error+"))
        .unwrap();
    let m = ctx.source("M");

    assert!(ctx.is_enabled(&m, Level::Trace));
    assert!(!ctx.is_enabled(&m, Level::Debug));
    assert!(!ctx.is_enabled(&m, Level::Warning));
    assert!(ctx.is_enabled(&m, Level::Error));
    assert!(ctx.is_enabled(&m, Level::Critical));
    assert_eq!(ctx.source_settings("M").mask, Some(1 | 32 | 64));
}

#[test]
fn test_rejected_enable_keeps_previous_mask() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reject.log");
    let ctx = context_with_default_file(&path);
    ctx.apply_update(&SourceUpdate::new("M").enable("notice+")).unwrap();

    let err = ctx
        .apply_update(&SourceUpdate::new("M").enable("notice+ shouty"))
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("'shouty' is not a valid log level. Should be one of {none, trace, debug, info, notice, warning, error, critical}."));
    assert_eq!(ctx.source_settings("M").mask, Some(Level::Notice.at_or_above()));

    // Reported on the LOGGING source through DEFAULT's sink
    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&format!("{} (warning) ", SOURCE_LOGGING)));
}

#[test]
fn test_history_returns_most_recent_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.log");
    let ctx = LoggingContext::with_settings(LoggingSettings {
        history_capacity: 5,
        write_failure: WriteFailurePolicy::Exit,
    });
    ctx.apply_update(&SourceUpdate::new(SOURCE_DEFAULT).output(path_str(&path)))
        .unwrap();
    let src = ctx.source("H");
    for i in 0..12 {
        ctx.emit(&src, Level::Info, Some("h.rs"), Some(i), format_args!("m{}", i));
    }

    let recent = ctx.recent(3);
    let texts: Vec<&str> = recent.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["m9", "m10", "m11"]);
    assert_eq!(recent[2].line, Some(11));
    assert_eq!(ctx.recent(0).len(), 5);
    assert_eq!(read_lines(&path).len(), 12);
}

#[test]
fn test_logger_macros_through_shared_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("macros.log");
    let ctx = Arc::new(context_with_default_file(&path));
    ctx.apply_update(&SourceUpdate::new("APP").source_display(true))
        .unwrap();
    let logger = ctx.logger("APP");

    log_info!(logger, "ready after {} ms", 12);
    let line = line!() - 1;
    log_error!(logger, "failed");

    let lines = read_lines(&path);
    assert_eq!(
        lines[0],
        format!("APP (info) ready after 12 ms ({}:{})", file!(), line)
    );
    assert!(lines[1].starts_with("APP (error) failed ("));
}

#[test]
fn test_shutdown_closes_all_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shutdown.log");
    let ctx = context_with_default_file(&path);
    ctx.apply_update(&SourceUpdate::new("A").output("syslog")).unwrap();
    ctx.apply_update(&SourceUpdate::new("B").output(path_str(&path)))
        .unwrap();
    let b = ctx.source("B");
    ctx.emit(&b, Level::Error, None, None, format_args!("last words"));

    let summary = ctx.shutdown();
    assert_eq!(summary.sources, 4);
    assert_eq!(summary.entries, 1);
    assert_eq!(summary.orphaned_sinks, 0);
    assert_eq!(read_lines(&path), vec!["B (error) last words"]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_fallback_policy_keeps_process_alive() {
    let ctx = LoggingContext::with_settings(LoggingSettings {
        write_failure: WriteFailurePolicy::FallbackStderr,
        ..Default::default()
    });
    ctx.apply_update(&SourceUpdate::new("FULL").output("/dev/full"))
        .unwrap();
    let full = ctx.source("FULL");
    for i in 0..3 {
        ctx.emit(&full, Level::Warning, None, None, format_args!("attempt {}", i));
    }
    assert_eq!(ctx.write_failures(), 3);
    assert_eq!(ctx.history_len(), 3);
}
