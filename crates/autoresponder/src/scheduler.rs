use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use deskbot_core::ports::{MessageSender, StateStore};

use crate::engine::AutoresponderEngine;

/// Drives `run_tick` on a fixed period until shutdown.
pub struct Scheduler<S, M> {
    engine: Arc<AutoresponderEngine<S, M>>,
    period: Duration,
}

impl<S, M> Scheduler<S, M>
where
    S: StateStore,
    M: MessageSender,
{
    pub fn new(engine: Arc<AutoresponderEngine<S, M>>, period: Duration) -> Self {
        Self { engine, period: period.max(Duration::from_millis(1)) }
    }

    pub fn from_policy(engine: Arc<AutoresponderEngine<S, M>>) -> Self {
        let period = Duration::from_secs(engine.policy().job_interval_secs);
        Self::new(engine, period)
    }

    /// Runs ticks until `shutdown` resolves, then flushes engine state.
    ///
    /// The first tick fires one period after start. Ticks that fall behind are
    /// skipped rather than bunched up. Returns the number of ticks attempted.
    pub async fn run_until<F>(self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            event_name = "autoresponder.scheduler.started",
            correlation_id = "scheduler",
            period_secs = self.period.as_secs(),
            "autoresponder scheduler started"
        );

        let mut ticks = 0_u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    ticks += 1;
                    if let Err(tick_error) = self.engine.run_tick().await {
                        error!(
                            event_name = "autoresponder.scheduler.tick_failed",
                            correlation_id = "scheduler",
                            tick = ticks,
                            error = %tick_error,
                            "autoresponder tick failed; retrying next period"
                        );
                    }
                }
            }
        }

        self.engine.flush().await;
        info!(
            event_name = "autoresponder.scheduler.stopped",
            correlation_id = "shutdown",
            ticks,
            "autoresponder scheduler stopped"
        );
        ticks
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use tokio::sync::Mutex;

    use deskbot_core::config::AutoresponderConfig;
    use deskbot_core::domain::message::{Message, MessageId, UserId};
    use deskbot_core::domain::office_hours::OfficeHours;
    use deskbot_core::errors::{SendError, StoreError};
    use deskbot_core::ports::{MessageSender, StateStore};
    use deskbot_db::InMemoryStateStore;

    use super::Scheduler;
    use crate::engine::AutoresponderEngine;

    #[derive(Default)]
    struct CountingSender {
        sends: Mutex<usize>,
    }

    #[async_trait]
    impl MessageSender for CountingSender {
        async fn send(&self, _channel_id: &str, _user_id: &UserId) -> Result<(), SendError> {
            *self.sends.lock().await += 1;
            Ok(())
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl StateStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }
    }

    fn always_after_hours() -> AutoresponderConfig {
        AutoresponderConfig {
            rooms: vec!["general".to_owned()],
            office_hours: OfficeHours::default(),
            job_interval_secs: 30,
            ..AutoresponderConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_period_until_shutdown() {
        let engine = Arc::new(AutoresponderEngine::new(
            InMemoryStateStore::default(),
            CountingSender::default(),
            always_after_hours(),
        ));

        let ticks = Scheduler::from_policy(engine)
            .run_until(tokio::time::sleep(Duration::from_secs(95)))
            .await;

        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_ticks_do_not_stop_the_scheduler() {
        let engine = Arc::new(AutoresponderEngine::new(
            UnavailableStore,
            CountingSender::default(),
            always_after_hours(),
        ));

        let ticks = Scheduler::new(engine, Duration::from_secs(10))
            .run_until(tokio::time::sleep(Duration::from_secs(45)))
            .await;

        assert_eq!(ticks, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_tick_replies_to_stale_message() {
        let sender = Arc::new(CountingSender::default());
        let engine = Arc::new(AutoresponderEngine::new(
            InMemoryStateStore::default(),
            sender.clone(),
            always_after_hours(),
        ));
        let posted_at = Utc::now() - chrono::Duration::hours(1);
        let message = Message {
            id: MessageId("M1".to_owned()),
            user_id: UserId("U1".to_owned()),
            email_address: None,
            channel_id: "C1".to_owned(),
            channel_name: "general".to_owned(),
            timestamp: posted_at,
            kind: "message".to_owned(),
            subtype: None,
            text: "anyone around?".to_owned(),
            is_agent: false,
        };
        engine.enqueue_at(message, posted_at).await.expect("enqueue");

        Scheduler::from_policy(engine.clone())
            .run_until(tokio::time::sleep(Duration::from_secs(31)))
            .await;

        assert_eq!(*sender.sends.lock().await, 1);
        assert_eq!(engine.snapshot().await.expect("snapshot").queued_messages(), 0);
    }
}
