use std::time::{Duration, Instant};

/// Logs how long a scope took when dropped.
///
/// ```
/// # use training::logging::ScopedTimer;
/// {
///     let _timer = ScopedTimer::new("load cifar10 (train)");
///     // work
/// }
/// ```
#[derive(Debug)]
pub struct ScopedTimer {
    label: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        log::debug!("{} ...", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!(
            "{} took {:.3}s",
            self.label,
            self.start.elapsed().as_secs_f64()
        );
    }
}
