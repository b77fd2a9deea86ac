//! Process-wide streaming configuration.

use std::time::Duration;

/// Bytes moved from archiver output to the sink per loop iteration.
pub const CHUNK_SIZE: usize = 100 * 1024;

/// How long an archiver that closed its output may take to exit before it
/// is killed.
pub const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Inter-chunk pacing, fixed for the lifetime of the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingConfig {
    /// Delay inserted after every non-final chunk. Zero disables pacing.
    pub delay_between_chunks: Duration,
}

impl PacingConfig {
    /// No artificial delay.
    pub fn none() -> Self {
        Self::default()
    }

    /// Pacing from a whole-second delay, as accepted on the command line.
    pub fn from_secs(secs: u64) -> Self {
        Self {
            delay_between_chunks: Duration::from_secs(secs),
        }
    }

    pub fn is_paced(&self) -> bool {
        !self.delay_between_chunks.is_zero()
    }
}
