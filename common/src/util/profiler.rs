use std::time::Instant;

/// Logs how long a phase took when it goes out of scope.
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: &'static str) -> Self {
        log::debug!("{} started", name);
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!("{} took {:.3} s", self.name, self.elapsed_secs());
    }
}
