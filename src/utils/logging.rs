//! Logging Module
//!
//! Structured logging with the `tracing` crate. Binaries call
//! [`init_logging`] once at startup; library code only emits events.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose logging for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }

    /// Service logging: no colors, module targets kept for log shipping
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: true,
            include_thread_ids: false,
            ansi_colors: false,
        }
    }

    /// Override the level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, falling back to `Info`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter().to_uppercase())
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: std::time::Instant,
    training_start: std::time::Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: std::time::Instant::now(),
            training_start: std::time::Instant::now(),
        }
    }

    /// Log start of an epoch
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = std::time::Instant::now();
        tracing::info!("Epoch {}/{}", epoch + 1, self.total_epochs);
    }

    /// Log one phase of an epoch (train or val)
    pub fn end_phase(&self, phase: &str, loss: f64, accuracy: f64) {
        tracing::info!("{} Loss: {:.4} Acc: {:.4}", phase, loss, accuracy);
    }

    /// Log end of an epoch
    pub fn end_epoch(&self) {
        let epoch_time = self.epoch_start.elapsed();
        let total_time = self.training_start.elapsed();
        let epochs_remaining = self.total_epochs.saturating_sub(self.epoch + 1);
        let avg_epoch_time = total_time.as_secs_f64() / (self.epoch + 1) as f64;

        tracing::info!(
            "Epoch {}/{} completed in {:.1}s | ETA: {:.0}s",
            self.epoch + 1,
            self.total_epochs,
            epoch_time.as_secs_f64(),
            epochs_remaining as f64 * avg_epoch_time
        );
    }

    /// Log a new best model
    pub fn log_new_best(&self, accuracy: f64) {
        tracing::info!("New best model saved with Acc: {:.4}", accuracy);
    }

    /// Log training completion
    pub fn log_complete(&self, best_accuracy: f64) {
        tracing::info!(
            "Training complete! {} epochs in {} | Best val Acc: {:.4}",
            self.total_epochs,
            super::format_duration(self.training_start.elapsed().as_secs_f64()),
            best_accuracy
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_log_config_presets() {
        assert_eq!(LogConfig::default().level, LogLevel::Info);
        assert_eq!(LogConfig::verbose().level, LogLevel::Debug);
        assert!(!LogConfig::production().ansi_colors);
        assert_eq!(
            LogConfig::quiet().with_level(LogLevel::Warn).level,
            LogLevel::Warn
        );
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
