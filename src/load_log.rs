use std::fmt;
use std::time::Instant;

use log::Level;


/// Diagnostics for a single load, each line stamped with the seconds elapsed since the load
/// started.  Passed explicitly to whatever needs to report progress.
pub struct LoadLog {
    epoch: Instant,
    target: &'static str,
}

impl LoadLog {
    pub fn new(target: &'static str) -> LoadLog {
        LoadLog::with_epoch(target, Instant::now())
    }

    pub fn with_epoch(target: &'static str, epoch: Instant) -> LoadLog {
        LoadLog{ epoch, target }
    }

    pub fn elapsed_secs(&self) -> f64 {
        let elapsed = self.epoch.elapsed();
        elapsed.as_secs() as f64 + elapsed.subsec_nanos() as f64 * 1e-9
    }

    pub fn log(&self, level: Level, args: fmt::Arguments) {
        log!(target: self.target, level, "[{:8.3}] {}", self.elapsed_secs(), args);
    }

    pub fn info(&self, args: fmt::Arguments) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments) {
        self.log(Level::Warn, args);
    }

    pub fn debug(&self, args: fmt::Arguments) {
        self.log(Level::Debug, args);
    }
}
