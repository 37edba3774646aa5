use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::ProducerConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{Level, Notification};
use crate::service::PollService;

/// Source of payloads for the [`BackgroundProducer`].
pub trait PayloadGenerator<P>: Send + 'static {
    fn generate(&mut self, rng: &mut StdRng) -> P;
}

impl<P, F> PayloadGenerator<P> for F
where
    F: FnMut(&mut StdRng) -> P + Send + 'static,
{
    fn generate(&mut self, rng: &mut StdRng) -> P {
        self(rng)
    }
}

/// System-activity messages emitted by the default generator.
const SYSTEM_MESSAGES: &[&str] = &[
    "System backup completed",
    "New order received",
    "User session expired",
    "Database optimization finished",
    "Security scan completed",
];

const SYSTEM_LEVELS: &[Level] = &[Level::Info, Level::Success, Level::Warning];

/// Default generator: a random system message at a random non-error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotificationGenerator;

impl PayloadGenerator<Notification> for NotificationGenerator {
    fn generate(&mut self, rng: &mut StdRng) -> Notification {
        let level = SYSTEM_LEVELS.choose(rng).copied().unwrap_or_default();
        let message = SYSTEM_MESSAGES
            .choose(rng)
            .copied()
            .unwrap_or("System event");
        Notification::new(level, message)
    }
}

/// Periodic task that publishes synthetic events through a [`PollService`].
///
/// It only ever calls the public `publish`, exactly like any other
/// producer. Dropping the handle cancels the task; [`stop`](Self::stop) also
/// waits for it, so no publish happens after `stop` returns.
pub struct BackgroundProducer {
    cancel: CancellationToken,
    handle: JoinHandle<u64>,
}

impl BackgroundProducer {
    /// Start publishing on the current tokio runtime.
    pub fn spawn<P, G>(
        service: PollService<P>,
        config: &ProducerConfig,
        mut generator: G,
    ) -> CoreResult<Self>
    where
        P: Clone + Send + 'static,
        G: PayloadGenerator<P>,
    {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (min, max) = (config.min_interval(), config.max_interval());

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut published = 0u64;
            loop {
                let delay = next_delay(&mut rng, min, max);
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {
                        let event = service.publish(generator.generate(&mut rng));
                        published += 1;
                        trace!(id = %event.id, "producer published");
                    }
                }
            }
            debug!(published, "producer loop exited");
            published
        });

        info!(
            min_interval_ms = config.min_interval_ms,
            max_interval_ms = config.max_interval_ms,
            "background producer started"
        );
        Ok(Self { cancel, handle })
    }

    /// Cancel the task and wait for it to exit.
    ///
    /// Returns how many events the producer published over its lifetime.
    pub async fn stop(mut self) -> CoreResult<u64> {
        self.cancel.cancel();
        let published = (&mut self.handle)
            .await
            .map_err(|e| CoreError::ProducerJoin(e.to_string()))?;
        info!(published, "background producer stopped");
        Ok(published)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for BackgroundProducer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Random pause in `[min, max]`, never shorter than a millisecond so the
/// loop always yields to the timer.
fn next_delay(rng: &mut StdRng, min: Duration, max: Duration) -> Duration {
    let delay = if min >= max {
        min
    } else {
        rng.gen_range(min..=max)
    };
    delay.max(Duration::from_millis(1))
}
