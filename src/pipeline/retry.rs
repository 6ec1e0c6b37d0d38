// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Bounded retry
//!
//! Re-runs a whole block as a unit. The block is rebuilt from scratch on
//! every attempt, so partial progress from a failed attempt is repeated.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How many times a block may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Extra attempts after the first
    pub fn retries(&self) -> u32 {
        self.max_attempts - 1
    }

    /// Run `block` until it succeeds or attempts run out.
    ///
    /// Returns the final result together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut block: F) -> (Result<T, E>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match block(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying",
                        label, attempt, self.max_attempts, e
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}
