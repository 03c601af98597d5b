//! Stable dispatch entry point and an optional retry decorator
//!
//! The client never retries on its own; wrapping any [`Dispatch`] in
//! [`Retry`] adds exponential backoff for retryable errors only.

use crate::api::params::RequestParameters;
use crate::errors::Result;
use crate::xml::Document;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Single entry point for sending one parameter set and getting a parsed document
pub trait Dispatch {
    fn dispatch(
        &mut self,
        params: &RequestParameters,
    ) -> impl Future<Output = Result<Document>> + Send;
}

impl<T: Dispatch + Send> Dispatch for &mut T {
    fn dispatch(
        &mut self,
        params: &RequestParameters,
    ) -> impl Future<Output = Result<Document>> + Send {
        (**self).dispatch(params)
    }
}

/// Backoff settings for [`Retry`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    /// Add up to 30% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).round() as u64;
        let mut delay = Duration::from_millis(millis).min(self.max_delay);

        if self.jitter {
            use rand::Rng;
            let jitter = rand::thread_rng().gen_range(0.0..0.3);
            delay += Duration::from_millis((delay.as_millis() as f64 * jitter) as u64);
        }

        delay
    }
}

/// Retrying wrapper around any dispatcher
#[derive(Debug)]
pub struct Retry<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: Dispatch> Retry<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Dispatch + Send> Dispatch for Retry<D> {
    async fn dispatch(&mut self, params: &RequestParameters) -> Result<Document> {
        let mut attempt = 0;
        loop {
            match self.inner.dispatch(params).await {
                Ok(document) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "retry_succeeded");
                    }
                    return Ok(document);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying_request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(max_retries = self.policy.max_retries, error = %err, "retries_exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}
