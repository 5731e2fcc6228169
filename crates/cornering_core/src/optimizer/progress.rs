/// Receives integer percentages in `0..=100`, never decreasing.
pub type ProgressCallback<'a> = Box<dyn Fn(u8) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, percent: u8) {
        if let Some(cb) = &self.callback {
            cb(percent);
        }
    }
}

/// Accumulates fractional progress for one run and reports each new integer
/// percentage once.
///
/// A run evaluates `(generations + 1) * population` individuals in total, so
/// each accepted individual advances by `100 / ((generations + 1) * population)`.
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    step: f64,
    value: f64,
    reported: u8,
}

impl ProgressTracker {
    pub(crate) fn new(generations: usize, population: usize) -> Self {
        let total = (generations as f64 + 1.0) * population.max(1) as f64;
        Self {
            step: 100.0 / total,
            value: 0.0,
            reported: 0,
        }
    }

    pub(crate) fn advance(&mut self, reporter: &ProgressReporter<'_>) {
        self.value += self.step;
        // Rounding drift must not reach 100 before `finish`.
        let percent = (self.value.floor() as u8).min(99);
        if percent > self.reported {
            self.reported = percent;
            reporter.report(percent);
        }
    }

    pub(crate) fn finish(&mut self, reporter: &ProgressReporter<'_>) {
        self.reported = 100;
        reporter.report(100);
    }

    #[cfg(test)]
    pub(crate) fn percent(&self) -> u8 {
        self.reported
    }
}
