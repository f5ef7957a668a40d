//! Metric logging backends.

/// Trait for logging training metrics to various backends.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. loss, normalized score).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Close the logger and flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing (default).
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
}

/// Logger that prints metrics to stdout via tracing.
#[derive(Default)]
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!("Step {}: {} = {:.4}", step, name, value);
    }
}

/// A composite logger that dispatches to multiple backends.
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}
