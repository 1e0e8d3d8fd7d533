use serde::{Deserialize, Serialize};

/// Progress of one byte transfer, as reported to hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    /// Rounded to the nearest integer, 0..=100
    pub percentage: u8,
}

impl UploadProgress {
    /// Compute progress for a transport tick. Returns `None` when the total is
    /// unknown or zero.
    pub fn compute(loaded: u64, total: Option<u64>) -> Option<Self> {
        let total = total.filter(|t| *t > 0)?;
        let loaded = loaded.min(total);
        // round-half-up of loaded * 100 / total
        let percentage = ((loaded as u128 * 200 + total as u128) / (total as u128 * 2)) as u8;
        Some(Self {
            loaded,
            total,
            percentage,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.loaded >= self.total
    }
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: UploadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(UploadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: UploadProgress) {
        self(progress)
    }
}
