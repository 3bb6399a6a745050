// driftsync: Catalog-Driven Infrastructure Sync Controller
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded exponential-backoff retry.
//!
//! ```text
//! retry.run(cancel, "apply", || driver.apply_task(cancel))
//!   attempt 0 --fail--> sleep ~1s+jitter
//!   attempt 1 --fail--> give up, surface the last error
//! ```
//!
//! The bound counts total tries: two attempts per operation by
//! default. The jitter source is seeded at construction so tests can
//! pin it.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Canceled, Result};

/// Additional attempts after the first failure: one retry, two tries
/// in total.
const DEFAULT_RETRIES: u8 = 1;

/// Bounded retry wrapper over an async operation.
pub struct Retry {
    max_retries: u8,
    rng: Mutex<StdRng>,
}

impl Default for Retry {
    fn default() -> Self {
        Self::new()
    }
}

impl Retry {
    /// Retry with the default bound of one extra attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retries(DEFAULT_RETRIES)
    }

    /// Retry with a custom bound.
    #[must_use]
    pub fn with_retries(max_retries: u8) -> Self {
        Self {
            max_retries,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Retry with a pinned jitter seed (tests).
    #[must_use]
    pub fn with_seed(max_retries: u8, seed: u64) -> Self {
        Self {
            max_retries,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Runs `op`, retrying failed attempts with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once the bound is exhausted, or
    /// [`Canceled`] if the token fires during a backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        desc: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u8 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    let wait = self.wait_time(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        wait_ms = %wait.as_millis(),
                        error = %format!("{e:#}"),
                        "{desc} failed, retrying"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(wait) => {}
                        () = cancel.cancelled() => return Err(Canceled.into()),
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff for the given attempt: `2^attempt` seconds plus up to a
    /// second of jitter.
    fn wait_time(&self, attempt: u8) -> Duration {
        let base = 1u64 << u32::from(attempt.min(10));
        let jitter = self
            .rng
            .lock()
            .expect("retry rng poisoned")
            .gen_range(0..1000);
        Duration::from_secs(base) + Duration::from_millis(jitter)
    }
}
