//! Runtime configuration.
//!
//! | Field | Default |
//! |-------|---------|
//! | `dispatch_batch_size` | 1024 |
//! | `max_dirty` | 64 |
//! | `max_queue_size` | 1024 |
//! | `timeout_resolution` | 10 ms |
//! | `seed` | `None` (random) |

use std::time::Duration;


const DEFAULT_DISPATCH_BATCH_SIZE: usize = 1024;
const DEFAULT_MAX_DIRTY: usize = 64;
const DEFAULT_MAX_QUEUE_SIZE: usize = 1024;
const DEFAULT_TIMEOUT_RESOLUTION: Duration = Duration::from_millis(10);


/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of dispatcher tasks run in one event-loop turn before yielding to the host.
    pub dispatch_batch_size: usize,
    /// Number of parkings on a channel wait-queue between compactions of its stale handlers.
    pub max_dirty: usize,
    /// Hard limit on parked puts (and, separately, parked takes) on a single channel.
    pub max_queue_size: usize,
    /// Timeouts whose deadlines fall within this window of an existing timeout share its channel.
    pub timeout_resolution: Duration,
    /// Seed for the alts shuffle and the timer skip list. Random if `None`.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dispatch_batch_size: DEFAULT_DISPATCH_BATCH_SIZE,
            max_dirty: DEFAULT_MAX_DIRTY,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            timeout_resolution: DEFAULT_TIMEOUT_RESOLUTION,
            seed: None,
        }
    }
}

impl Config {
    /// Ownership-chaining setter for `dispatch_batch_size`. Clamped to at least 1.
    pub fn with_dispatch_batch_size(mut self, n: usize) -> Self {
        self.dispatch_batch_size = n.max(1);
        self
    }

    /// Ownership-chaining setter for `max_dirty`
    pub fn with_max_dirty(mut self, n: usize) -> Self {
        self.max_dirty = n;
        self
    }

    /// Ownership-chaining setter for `max_queue_size`
    pub fn with_max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }

    /// Ownership-chaining setter for `timeout_resolution`
    pub fn with_timeout_resolution(mut self, resolution: Duration) -> Self {
        self.timeout_resolution = resolution;
        self
    }

    /// Ownership-chaining setter for `seed`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    // limits copied into each channel at construction.
    pub(crate) fn limits(&self) -> Limits {
        Limits {
            max_dirty: self.max_dirty,
            max_queue_size: self.max_queue_size,
        }
    }
}

// per-channel copy of the wait-queue limits.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Limits {
    pub(crate) max_dirty: usize,
    pub(crate) max_queue_size: usize,
}
