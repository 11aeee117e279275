//! Logging and diagnostics setup.
//!
//! The library only emits `tracing` events; a host calls one of the `init`
//! functions once at startup:
//!
//! - [`init`]: pretty stdout output
//! - [`init_with_file`]: stdout plus a daily-rolling JSON file
//!
//! Both redirect `log` macros to `tracing` and install a `miette` report
//! handler suited to the terminal.

use std::fs;
use std::io;
use std::path::Path;

use is_terminal::IsTerminal;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name prefix for rolled log files.
pub const LOG_FILE_NAME: &str = "compendium.log";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

// ============================================================================
// Terminal Capability Detection
// ============================================================================

/// What the attached terminal can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub is_interactive: bool,
    pub supports_unicode: bool,
}

impl TerminalCapabilities {
    pub fn detect() -> Self {
        let is_interactive = io::stderr().is_terminal();

        // Unicode support heuristic
        let supports_unicode = std::env::var("TERM")
            .map(|t| !t.contains("dumb"))
            .unwrap_or(true)
            && std::env::var("LANG")
                .map(|l| l.contains("UTF-8") || l.contains("utf8"))
                .unwrap_or(true);

        Self {
            is_interactive,
            supports_unicode,
        }
    }

    /// Colors only when a person is watching and `NO_COLOR` is unset.
    pub fn should_colorize(&self) -> bool {
        self.is_interactive && std::env::var_os("NO_COLOR").is_none()
    }
}

// ============================================================================
// Logging Initialization
// ============================================================================

/// `RUST_LOG` if set and valid, else `fallback`.
pub fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install a pretty stdout subscriber.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init() {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .pretty()
        .with_filter(build_filter(DEFAULT_FILTER));

    if let Err(e) = tracing_subscriber::registry().with(stdout_layer).try_init() {
        eprintln!("Logging already initialized: {}", e);
    }
    finish_init();
}

/// Install stdout logging plus a daily-rolling JSON log in `log_dir`.
///
/// Returns a `WorkerGuard` which must be kept alive for the duration of the
/// application so buffered lines are flushed on shutdown.
pub fn init_with_file(log_dir: &Path) -> WorkerGuard {
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(log_dir) {
            eprintln!("Failed to create logs directory: {}", e);
        }
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = build_filter(DEFAULT_FILTER);

    // File Layer: JSON format for easy parsing/ingestion
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_filter(env_filter.clone());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .pretty()
        .with_filter(env_filter);

    if let Err(e) = tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
    {
        eprintln!("Logging already initialized: {}", e);
    }
    finish_init();

    log::info!(
        "Logging initialized. Writing to: {:?} (daily rolling)",
        log_dir.join(LOG_FILE_NAME)
    );

    guard
}

fn finish_init() {
    // The subscriber may already have installed the bridge.
    let _ = tracing_log::LogTracer::init();
    init_miette();
}

/// Configure miette for error reporting on this terminal.
fn init_miette() {
    let caps = TerminalCapabilities::detect();

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .unicode(caps.supports_unicode)
                .context_lines(3)
                .tab_width(4)
                .break_words(true)
                .color(caps.should_colorize())
                .build(),
        )
    }))
    .ok(); // Ignore if already set
}

// ============================================================================
// Diagnostic Rendering
// ============================================================================

/// Render a diagnostic (e.g. an unbalanced markup error) as plain text with
/// its source snippet and labels.
pub fn render_diagnostic(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut out, diagnostic).is_err() {
        return diagnostic.to_string();
    }
    out
}
