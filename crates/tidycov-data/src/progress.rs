//! Progress reporting for long covariate scans.

/// Receives progress from a stage that walks covariate groups.
///
/// Stages call [`Progress::start`] once with the number of groups they
/// expect (when known), then [`Progress::advance`] per group processed.
pub trait Progress {
    /// A scan over `total` groups is starting.
    fn start(&self, stage: &str, total: Option<u64>);

    /// `count` more groups were processed.
    fn advance(&self, count: u64);

    /// The scan finished.
    fn finish(&self) {}
}

/// Progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _stage: &str, _total: Option<u64>) {}

    fn advance(&self, _count: u64) {}
}

impl<P: Progress + ?Sized> Progress for &P {
    fn start(&self, stage: &str, total: Option<u64>) {
        (**self).start(stage, total);
    }

    fn advance(&self, count: u64) {
        (**self).advance(count);
    }

    fn finish(&self) {
        (**self).finish();
    }
}
