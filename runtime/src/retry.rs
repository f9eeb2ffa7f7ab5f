use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

use codec::CodecGateway;
use message::Frame;

use crate::{
    Error,
    LinkController,
    Transport,
};

/// Proportion of each delay to jitter: delays are scaled by a random factor in
/// `[1 - JITTER_FACTOR, 1 + JITTER_FACTOR]`.
const JITTER_FACTOR: f64 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay:  Duration,
    pub max_count:  usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay:  Duration::from_secs(8),
            max_count:  3,
        }
    }
}

impl RetryPolicy {
    /// Doubling delays from `base_delay`, capped and jittered.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);

        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(|dur| {
                // make distribution even about 0, scale by factor, offset about 1
                let jitter = (rand::random::<f64>() - 0.5) * JITTER_FACTOR * 2. + 1.;

                dur.mul_f64(jitter)
            })
            .take(self.max_count)
    }
}

/// Attempt [`LinkController::connect`] until it succeeds, fails permanently, or the policy runs out.
#[tracing::instrument(skip(controller), err(Display))]
pub async fn connect_with_retry<T, G>(
    controller: &mut LinkController<T, G>,
    policy: &RetryPolicy,
) -> Result<Frame, Error>
where
    T: Transport + 'static,
    G: CodecGateway + 'static,
{
    let mut delays = policy.delays();

    loop {
        let e = match controller.connect().await {
            Ok(frame) => return Ok(frame),
            Err(e) if e.is_retryable() => e,
            Err(e) => return Err(e),
        };

        match delays.next() {
            Some(delay) => {
                tracing::warn!(error = %e, ?delay, "connection attempt failed, retrying");
                tokio::time::sleep(delay).await;
            },
            None => return Err(e),
        }
    }
}
