//! Concurrency limiter for tile transcodes.
//!
//! A semaphore-based limiter that caps how many tiles are being transcoded
//! and written at once. Permits are owned, so they move into the spawned
//! task and are released when that task finishes, however it finishes.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use tilesqueeze::pipeline::ConcurrencyLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(ConcurrencyLimiter::new(8, "transcode"));
//!
//! let permit = limiter.acquire().await.unwrap();
//! tokio::spawn(async move {
//!     let _permit = permit;
//!     // transcode happens here; the permit is released on drop
//! });
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Caps the number of concurrently running operations.
///
/// Tracks the current and peak in-flight counts so callers (and tests) can
/// observe that the bound holds.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,

    max_permits: usize,

    /// Operations currently holding a permit
    in_flight: Arc<AtomicUsize>,

    /// Highest in-flight count observed
    peak_in_flight: AtomicUsize,

    /// Label for log output
    label: String,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing `max_concurrent` simultaneous operations.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize, label: impl Into<String>) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Waits for a permit.
    ///
    /// Errors only if the semaphore is closed, which this type never does.
    pub async fn acquire(&self) -> Result<ConcurrencyPermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> ConcurrencyPermit {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);

        ConcurrencyPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Maximum number of concurrent operations allowed.
    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    /// Current number of in-flight operations.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Peak number of concurrent operations observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }
}

/// A held slot in the limiter, released on drop.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
