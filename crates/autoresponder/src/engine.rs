use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskbot_core::autoresponder::{classify, decide_reply, EnqueueVerdict, ReplyDecision, SkipReason};
use deskbot_core::config::AutoresponderConfig;
use deskbot_core::domain::channel::{Channel, ChannelCollection, CHANNELS_KEY};
use deskbot_core::domain::cooldown::{
    cooldown_key, decode_last_autoresponse, encode_last_autoresponse,
};
use deskbot_core::domain::message::{Message, UserId};
use deskbot_core::errors::{SendError, StoreError};
use deskbot_core::ports::{MessageSender, StateStore};
use deskbot_core::{DeferReason, DropReason};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not load channel state: {0}")]
    Load(#[source] StoreError),
    #[error("could not save channel state: {0}")]
    Save(#[source] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    pub queued: bool,
    pub reason: Option<SkipReason>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub channels: usize,
    pub sent: usize,
    pub dropped: usize,
    pub deferred: usize,
    pub failed_sends: usize,
    pub pruned: usize,
}

struct PendingSend {
    channel_id: String,
    message_id: String,
    user_id: UserId,
}

/// Owns the channel queues and per-user cooldowns.
///
/// Every read-modify-write of the persisted collection runs under `state_lock`,
/// so the inbound enqueue path and the scheduled tick never overwrite each other.
/// Replies go out only after the lock has been released.
pub struct AutoresponderEngine<S, M> {
    store: S,
    sender: M,
    policy: AutoresponderConfig,
    state_lock: Mutex<()>,
}

impl<S, M> AutoresponderEngine<S, M>
where
    S: StateStore,
    M: MessageSender,
{
    pub fn new(store: S, sender: M, policy: AutoresponderConfig) -> Self {
        Self { store, sender, policy, state_lock: Mutex::new(()) }
    }

    pub fn policy(&self) -> &AutoresponderConfig {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn enqueue(&self, message: Message) -> Result<EnqueueOutcome, EngineError> {
        self.enqueue_at(message, Utc::now()).await
    }

    pub async fn enqueue_at(
        &self,
        message: Message,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome, EngineError> {
        let _guard = self.state_lock.lock().await;
        let correlation_id = message.id.0.clone();
        let mut channels = self.load_channels(&correlation_id).await?;

        let mut channel = channels
            .get(&message.channel_id)
            .cloned()
            .unwrap_or_else(|| Channel::new(message.channel_id.clone()));
        let verdict = classify(&mut channel, &message, now, &self.policy);

        let outcome = match verdict {
            EnqueueVerdict::Enqueue => {
                info!(
                    event_name = "autoresponder.enqueue.accepted",
                    correlation_id = %correlation_id,
                    channel_id = %message.channel_id,
                    message_id = %message.id.0,
                    user_id = %message.user_id.0,
                    queue_depth = channel.messages.len() + 1,
                    "message queued for autoresponse"
                );
                channel.messages.push(message);
                EnqueueOutcome { queued: true, reason: None }
            }
            EnqueueVerdict::Skip(SkipReason::AgentMessage) => {
                info!(
                    event_name = "autoresponder.enqueue.agent_activity",
                    correlation_id = %correlation_id,
                    channel_id = %message.channel_id,
                    user_id = %message.user_id.0,
                    "agent activity cleared channel queue"
                );
                EnqueueOutcome { queued: false, reason: Some(SkipReason::AgentMessage) }
            }
            EnqueueVerdict::Skip(reason) => {
                debug!(
                    event_name = "autoresponder.enqueue.skipped",
                    correlation_id = %correlation_id,
                    channel_id = %message.channel_id,
                    message_id = %message.id.0,
                    reason = reason.as_str(),
                    "message not eligible for autoresponse"
                );
                return Ok(EnqueueOutcome { queued: false, reason: Some(reason) });
            }
        };

        channels.upsert(channel);
        self.save_channels(&channels).await?;
        Ok(outcome)
    }

    pub async fn run_tick(&self) -> Result<TickReport, EngineError> {
        self.run_tick_at(Utc::now()).await
    }

    /// Evaluates every queued message once.
    ///
    /// The collection is saved before any cooldown is written, and cooldowns are
    /// written before any reply is sent. A failed save therefore leaves the tick
    /// without effect, and a failed send still consumes the user's cooldown.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let mut report = TickReport::default();

        let pending = {
            let _guard = self.state_lock.lock().await;
            let mut channels = match self.load_channels(&correlation_id).await {
                Ok(channels) => channels,
                Err(load_error) => {
                    error!(
                        event_name = "autoresponder.tick.load_failed",
                        correlation_id = %correlation_id,
                        error = %load_error,
                        "tick skipped; channel state unavailable"
                    );
                    return Err(load_error);
                }
            };
            report.channels = channels.channels.len();

            let mut cooldowns: HashMap<UserId, Option<DateTime<Utc>>> = HashMap::new();
            let mut pending = Vec::new();
            for channel in &mut channels.channels {
                self.evaluate_channel(
                    channel,
                    now,
                    &correlation_id,
                    &mut cooldowns,
                    &mut pending,
                    &mut report,
                )
                .await;
            }

            report.pruned = channels.prune_idle(now, self.policy.idle_channel_retention());

            if let Err(save_error) = self.save_channels(&channels).await {
                error!(
                    event_name = "autoresponder.tick.save_failed",
                    correlation_id = %correlation_id,
                    error = %save_error,
                    "tick discarded; channel state could not be saved"
                );
                return Err(save_error);
            }

            self.record_cooldowns(pending, now, &correlation_id, &mut report).await
        };

        for send in pending {
            self.dispatch(send, &correlation_id, &mut report).await;
        }

        info!(
            event_name = "autoresponder.tick.completed",
            correlation_id = %correlation_id,
            channels = report.channels,
            sent = report.sent,
            dropped = report.dropped,
            deferred = report.deferred,
            failed_sends = report.failed_sends,
            pruned = report.pruned,
            "autoresponder tick completed"
        );

        Ok(report)
    }

    /// Waits for any in-flight read-modify-write to land in the store.
    pub async fn flush(&self) {
        let _guard = self.state_lock.lock().await;
        info!(
            event_name = "autoresponder.flush.completed",
            correlation_id = "shutdown",
            "autoresponder state flushed"
        );
    }

    pub async fn snapshot(&self) -> Result<ChannelCollection, EngineError> {
        let _guard = self.state_lock.lock().await;
        self.load_channels("snapshot").await
    }

    async fn evaluate_channel(
        &self,
        channel: &mut Channel,
        now: DateTime<Utc>,
        correlation_id: &str,
        cooldowns: &mut HashMap<UserId, Option<DateTime<Utc>>>,
        pending: &mut Vec<PendingSend>,
        report: &mut TickReport,
    ) {
        let queued = std::mem::take(&mut channel.messages);
        let mut kept = Vec::with_capacity(queued.len());

        for message in queued {
            let decision = match decide_reply(channel, &message, now, None, &self.policy) {
                ReplyDecision::Defer(reason) => ReplyDecision::Defer(reason),
                _ => match self.last_autoresponse(&message.user_id, cooldowns, correlation_id).await
                {
                    Ok(last) => decide_reply(channel, &message, now, last, &self.policy),
                    Err(read_error) => {
                        warn!(
                            event_name = "autoresponder.cooldown.read_failed",
                            correlation_id = %correlation_id,
                            channel_id = %channel.id,
                            message_id = %message.id.0,
                            user_id = %message.user_id.0,
                            error = %read_error,
                            "cooldown unavailable; deferring message"
                        );
                        ReplyDecision::Defer(DeferReason::CooldownUnknown)
                    }
                },
            };

            debug!(
                event_name = "autoresponder.tick.decision",
                correlation_id = %correlation_id,
                channel_id = %channel.id,
                message_id = %message.id.0,
                user_id = %message.user_id.0,
                decision = decision.label(),
                "queued message evaluated"
            );

            match decision {
                ReplyDecision::Send => {
                    cooldowns.insert(message.user_id.clone(), Some(now));
                    pending.push(PendingSend {
                        channel_id: channel.id.clone(),
                        message_id: message.id.0,
                        user_id: message.user_id,
                    });
                }
                ReplyDecision::Drop(DropReason::UserCooldown) => report.dropped += 1,
                ReplyDecision::Defer(_) => {
                    report.deferred += 1;
                    kept.push(message);
                }
            }
        }

        channel.messages = kept;
    }

    async fn last_autoresponse(
        &self,
        user_id: &UserId,
        cooldowns: &mut HashMap<UserId, Option<DateTime<Utc>>>,
        correlation_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        if let Some(cached) = cooldowns.get(user_id) {
            return Ok(*cached);
        }

        let last = match self.store.get(&cooldown_key(user_id)).await? {
            Some(value) => {
                let decoded = decode_last_autoresponse(&value);
                if decoded.is_none() {
                    warn!(
                        event_name = "autoresponder.cooldown.malformed",
                        correlation_id = %correlation_id,
                        user_id = %user_id.0,
                        "ignoring unreadable cooldown entry"
                    );
                }
                decoded
            }
            None => None,
        };

        cooldowns.insert(user_id.clone(), last);
        Ok(last)
    }

    async fn record_cooldowns(
        &self,
        pending: Vec<PendingSend>,
        now: DateTime<Utc>,
        correlation_id: &str,
        report: &mut TickReport,
    ) -> Vec<PendingSend> {
        let mut ready = Vec::with_capacity(pending.len());
        for send in pending {
            let key = cooldown_key(&send.user_id);
            match self.store.set(&key, encode_last_autoresponse(now)).await {
                Ok(()) => ready.push(send),
                Err(write_error) => {
                    report.failed_sends += 1;
                    warn!(
                        event_name = "autoresponder.cooldown.write_failed",
                        correlation_id = %correlation_id,
                        channel_id = %send.channel_id,
                        message_id = %send.message_id,
                        user_id = %send.user_id.0,
                        error = %write_error,
                        "reply withheld; cooldown could not be recorded"
                    );
                }
            }
        }
        ready
    }

    async fn dispatch(&self, send: PendingSend, correlation_id: &str, report: &mut TickReport) {
        let limit = self.policy.send_timeout_secs;
        let result = tokio::time::timeout(
            Duration::from_secs(limit),
            self.sender.send(&send.channel_id, &send.user_id),
        )
        .await
        .unwrap_or(Err(SendError::Timeout(limit)));

        match result {
            Ok(()) => {
                report.sent += 1;
                info!(
                    event_name = "autoresponder.reply.sent",
                    correlation_id = %correlation_id,
                    channel_id = %send.channel_id,
                    message_id = %send.message_id,
                    user_id = %send.user_id.0,
                    "automated reply sent"
                );
            }
            Err(send_error) => {
                report.failed_sends += 1;
                warn!(
                    event_name = "autoresponder.reply.failed",
                    correlation_id = %correlation_id,
                    channel_id = %send.channel_id,
                    message_id = %send.message_id,
                    user_id = %send.user_id.0,
                    error = %send_error,
                    "automated reply failed; message will not be retried"
                );
            }
        }
    }

    async fn load_channels(&self, correlation_id: &str) -> Result<ChannelCollection, EngineError> {
        let raw = self.store.get(CHANNELS_KEY).await.map_err(EngineError::Load)?;
        let (channels, report) = ChannelCollection::decode(raw);
        if !report.is_clean() {
            warn!(
                event_name = "autoresponder.state.entries_skipped",
                correlation_id = %correlation_id,
                skipped_channels = report.skipped_channels,
                skipped_messages = report.skipped_messages,
                "skipped malformed channel state entries"
            );
        }
        Ok(channels)
    }

    async fn save_channels(&self, channels: &ChannelCollection) -> Result<(), EngineError> {
        let value = channels.encode().map_err(|encode_error| {
            EngineError::Save(StoreError::Encode {
                key: CHANNELS_KEY.to_string(),
                detail: encode_error.to_string(),
            })
        })?;
        self.store.set(CHANNELS_KEY, value).await.map_err(EngineError::Save)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc, Weekday};
    use chrono_tz::Tz;
    use serde_json::{json, Value};
    use tokio::sync::{Mutex, Notify};

    use deskbot_core::config::AutoresponderConfig;
    use deskbot_core::domain::channel::CHANNELS_KEY;
    use deskbot_core::domain::cooldown::{
        cooldown_key, decode_last_autoresponse, COOLDOWN_KEY_PREFIX,
    };
    use deskbot_core::domain::message::{Message, MessageId, UserId};
    use deskbot_core::domain::office_hours::{DailyWindow, OfficeHours};
    use deskbot_core::errors::{SendError, StoreError};
    use deskbot_core::ports::{MessageSender, StateStore};
    use deskbot_core::SkipReason;
    use deskbot_db::InMemoryStateStore;

    use super::{AutoresponderEngine, EngineError, TickReport};

    #[derive(Clone, Copy)]
    enum SendBehavior {
        Succeed,
        Fail,
        Hang,
    }

    struct ScriptedSender {
        behaviors: Mutex<VecDeque<SendBehavior>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSender {
        fn new(behaviors: Vec<SendBehavior>) -> Self {
            Self { behaviors: Mutex::new(behaviors.into()), calls: Mutex::new(Vec::new()) }
        }

        fn succeeding() -> Self {
            Self::new(Vec::new())
        }

        async fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl MessageSender for ScriptedSender {
        async fn send(&self, channel_id: &str, user_id: &UserId) -> Result<(), SendError> {
            self.calls.lock().await.push((channel_id.to_owned(), user_id.0.clone()));
            let behavior = self.behaviors.lock().await.pop_front().unwrap_or(SendBehavior::Succeed);
            match behavior {
                SendBehavior::Succeed => Ok(()),
                SendBehavior::Fail => Err(SendError::Transport("connection refused".to_owned())),
                SendBehavior::Hang => {
                    tokio::time::sleep(StdDuration::from_secs(3_600)).await;
                    Ok(())
                }
            }
        }
    }

    #[derive(Default)]
    struct UnavailableStore;

    #[async_trait]
    impl StateStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Unavailable("database is locked".to_owned()))
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("database is locked".to_owned()))
        }
    }

    /// In-memory store that fails reads or writes for chosen keys and can
    /// park the first cooldown read until released.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStateStore,
        failing_reads: Mutex<HashSet<String>>,
        failing_writes: Mutex<HashSet<String>>,
        hold_cooldown_read: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    impl FlakyStore {
        async fn fail_reads(&self, key: String) {
            self.failing_reads.lock().await.insert(key);
        }

        async fn fail_writes(&self, key: String) {
            self.failing_writes.lock().await.insert(key);
        }

        async fn heal(&self) {
            self.failing_reads.lock().await.clear();
            self.failing_writes.lock().await.clear();
        }
    }

    #[async_trait]
    impl StateStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            let hold = key.starts_with(COOLDOWN_KEY_PREFIX)
                && self.hold_cooldown_read.swap(false, Ordering::SeqCst);
            if hold {
                self.reached.notify_one();
                self.release.notified().await;
            }
            if self.failing_reads.lock().await.contains(key) {
                return Err(StoreError::Unavailable("disk I/O error".to_owned()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            if self.failing_writes.lock().await.contains(key) {
                return Err(StoreError::Unavailable("disk I/O error".to_owned()));
            }
            self.inner.set(key, value).await
        }
    }

    type FlakyEngine = AutoresponderEngine<Arc<FlakyStore>, Arc<ScriptedSender>>;

    fn flaky_engine() -> (FlakyEngine, Arc<FlakyStore>, Arc<ScriptedSender>) {
        let store = Arc::new(FlakyStore::default());
        let sender = Arc::new(ScriptedSender::succeeding());
        (AutoresponderEngine::new(store.clone(), sender.clone(), policy()), store, sender)
    }

    type TestEngine = AutoresponderEngine<Arc<InMemoryStateStore>, Arc<ScriptedSender>>;

    /// Monday 2026-03-02 20:00 UTC, outside 09:00-17:00 office hours.
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap()
    }

    fn policy() -> AutoresponderConfig {
        let window = DailyWindow::parse("09:00", "17:00").unwrap();
        let office_hours = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .fold(OfficeHours::new(Tz::UTC), |hours, day| hours.with_window(day, window));
        AutoresponderConfig {
            rooms: vec!["general".to_owned()],
            office_hours,
            send_timeout_secs: 1,
            ..AutoresponderConfig::default()
        }
    }

    fn due(policy: &AutoresponderConfig) -> DateTime<Utc> {
        t0() + policy.timeout() + Duration::seconds(1)
    }

    fn engine(sender: ScriptedSender) -> (TestEngine, Arc<InMemoryStateStore>, Arc<ScriptedSender>) {
        let store = Arc::new(InMemoryStateStore::default());
        let sender = Arc::new(sender);
        (AutoresponderEngine::new(store.clone(), sender.clone(), policy()), store, sender)
    }

    fn message(id: &str, channel_id: &str, user_id: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId(id.to_owned()),
            user_id: UserId(user_id.to_owned()),
            email_address: Some(format!("{user_id}@customer.io")),
            channel_id: channel_id.to_owned(),
            channel_name: "general".to_owned(),
            timestamp: at,
            kind: "message".to_owned(),
            subtype: None,
            text: "help please".to_owned(),
            is_agent: false,
        }
    }

    fn agent(id: &str, channel_id: &str, at: DateTime<Utc>) -> Message {
        Message {
            email_address: Some("agent@example.com".to_owned()),
            text: "<@U1> looking into it".to_owned(),
            is_agent: true,
            ..message(id, channel_id, "UAGENT", at)
        }
    }

    async fn stored_cooldown(store: &impl StateStore, user_id: &str) -> Option<DateTime<Utc>> {
        let value = store.get(&cooldown_key(&UserId(user_id.to_owned()))).await.expect("get");
        value.as_ref().and_then(decode_last_autoresponse)
    }

    #[tokio::test]
    async fn unanswered_message_gets_one_reply_after_timeout() {
        let (engine, store, sender) = engine(ScriptedSender::succeeding());

        let outcome =
            engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        assert!(outcome.queued);

        let now = due(engine.policy());
        let report = engine.run_tick_at(now).await.expect("tick");

        assert_eq!(report.sent, 1);
        assert_eq!(sender.calls().await, vec![("C1".to_owned(), "U1".to_owned())]);
        let snapshot = engine.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.queued_messages(), 0);
        assert_eq!(stored_cooldown(&store, "U1").await, Some(now));
    }

    #[tokio::test]
    async fn agent_reply_clears_queue_and_later_tick_sends_nothing() {
        let (engine, _store, sender) = engine(ScriptedSender::succeeding());

        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        let agent_at = t0() + Duration::seconds(5);
        let outcome = engine.enqueue_at(agent("M2", "C1", agent_at), agent_at).await.expect("agent");
        assert_eq!(outcome.reason, Some(SkipReason::AgentMessage));

        let snapshot = engine.snapshot().await.expect("snapshot");
        let channel = snapshot.get("C1").expect("channel kept");
        assert!(channel.messages.is_empty());
        assert_eq!(channel.last_agent_message_time, agent_at);

        let report = engine.run_tick_at(due(engine.policy())).await.expect("tick");
        assert_eq!(report.sent, 0);
        assert!(sender.calls().await.is_empty());
    }

    #[tokio::test]
    async fn one_reply_per_user_inside_cooldown_window() {
        let (engine, _store, sender) = engine(ScriptedSender::succeeding());
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        engine.enqueue_at(message("M2", "C2", "U1", t0()), t0()).await.expect("enqueue");

        let first = engine.run_tick_at(due(engine.policy())).await.expect("tick");
        assert_eq!((first.sent, first.dropped), (1, 1));

        let later = t0() + Duration::hours(1);
        engine.enqueue_at(message("M3", "C1", "U1", later), later).await.expect("enqueue");
        let second =
            engine.run_tick_at(later + engine.policy().timeout() + Duration::seconds(1)).await;

        assert_eq!(second.expect("tick").dropped, 1);
        assert_eq!(sender.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn young_messages_stay_queued_in_order() {
        let (engine, store, sender) = engine(ScriptedSender::succeeding());
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        let second = t0() + Duration::seconds(2);
        engine.enqueue_at(message("M2", "C1", "U2", second), second).await.expect("enqueue");

        let report = engine.run_tick_at(t0() + Duration::seconds(10)).await.expect("tick");

        assert_eq!(report, TickReport { channels: 1, deferred: 2, ..TickReport::default() });
        assert!(sender.calls().await.is_empty());
        assert_eq!(stored_cooldown(&store, "U1").await, None);
        let snapshot = engine.snapshot().await.expect("snapshot");
        let ids = snapshot.get("C1").expect("channel").messages.iter().map(|m| m.id.0.clone());
        assert_eq!(ids.collect::<Vec<_>>(), vec!["M1", "M2"]);
    }

    #[tokio::test]
    async fn failed_send_still_consumes_cooldown_and_is_not_requeued() {
        let (engine, store, sender) = engine(ScriptedSender::new(vec![SendBehavior::Fail]));
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");

        let now = due(engine.policy());
        let report = engine.run_tick_at(now).await.expect("tick");

        assert_eq!((report.sent, report.failed_sends), (0, 1));
        assert_eq!(engine.snapshot().await.expect("snapshot").queued_messages(), 0);
        assert_eq!(stored_cooldown(&store, "U1").await, Some(now));

        let later = now + Duration::seconds(60);
        engine.enqueue_at(message("M2", "C1", "U1", later), later).await.expect("enqueue");
        let retry = engine
            .run_tick_at(later + engine.policy().timeout() + Duration::seconds(1))
            .await
            .expect("tick");
        assert_eq!(retry.dropped, 1);
        assert_eq!(sender.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_send_is_bounded_by_send_timeout() {
        let (engine, _store, sender) = engine(ScriptedSender::new(vec![SendBehavior::Hang]));
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        engine.enqueue_at(message("M2", "C2", "U2", t0()), t0()).await.expect("enqueue");

        let report = engine.run_tick_at(due(engine.policy())).await.expect("tick");

        assert_eq!((report.sent, report.failed_sends), (1, 1));
        assert_eq!(sender.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_stored_entries_are_skipped_not_fatal() {
        let (engine, store, sender) = engine(ScriptedSender::succeeding());
        let good = serde_json::to_value(message("M1", "C1", "U1", t0())).expect("encode");
        store
            .set(
                CHANNELS_KEY,
                json!([
                    { "id": "C1", "last_agent_message_time": "1970-01-01T00:00:00Z",
                      "messages": [{ "text": 42 }, good] },
                    { "garbage": true }
                ]),
            )
            .await
            .expect("seed");

        let report = engine.run_tick_at(due(engine.policy())).await.expect("tick");

        assert_eq!(report.sent, 1);
        assert_eq!(sender.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn store_outage_fails_tick_without_sending() {
        let sender = Arc::new(ScriptedSender::succeeding());
        let engine = AutoresponderEngine::new(UnavailableStore, sender.clone(), policy());

        let result = engine.run_tick_at(due(engine.policy())).await;

        assert!(matches!(result, Err(EngineError::Load(StoreError::Unavailable(_)))));
        assert!(sender.calls().await.is_empty());
    }

    #[tokio::test]
    async fn idle_empty_channels_are_pruned() {
        let (engine, _store, _sender) = engine(ScriptedSender::succeeding());
        engine.enqueue_at(agent("M1", "C1", t0()), t0()).await.expect("agent");

        let soon = engine.run_tick_at(t0() + Duration::seconds(60)).await.expect("tick");
        assert_eq!(soon.pruned, 0);

        let later = t0() + engine.policy().idle_channel_retention() + Duration::seconds(1);
        let report = engine.run_tick_at(later).await.expect("tick");
        assert_eq!(report.pruned, 1);
        assert!(engine.snapshot().await.expect("snapshot").channels.is_empty());
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_not_lost() {
        let (engine, _store, _sender) = engine(ScriptedSender::succeeding());
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for index in 0..16 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let channel = format!("C{}", index % 4);
                let user = format!("U{index}");
                engine
                    .enqueue_at(message(&format!("M{index}"), &channel, &user, t0()), t0())
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.expect("join").expect("enqueue").queued);
        }

        let snapshot = engine.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.channels.len(), 4);
        assert_eq!(snapshot.queued_messages(), 16);
    }

    #[tokio::test]
    async fn skipped_messages_leave_state_untouched() {
        let (engine, store, _sender) = engine(ScriptedSender::succeeding());
        let mut mention = message("M1", "C1", "U1", t0());
        mention.text = "<@U2> thanks!".to_owned();

        let outcome = engine.enqueue_at(mention, t0()).await.expect("enqueue");

        assert_eq!(outcome.reason, Some(SkipReason::DirectedMention));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_skipped_not_panicking() {
        let (engine, store, _sender) = engine(ScriptedSender::succeeding());
        let engine = Arc::new(engine);
        let ancient = DateTime::from_timestamp(-8_334_601_228_800, 0).expect("representable");

        let handle = tokio::spawn({
            let engine = engine.clone();
            async move { engine.enqueue_at(message("M1", "C1", "U1", ancient), t0()).await }
        });
        let outcome = handle.await.expect("enqueue task must not panic").expect("enqueue");

        assert_eq!(outcome.reason, Some(SkipReason::Malformed));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn cooldown_read_failure_defers_only_that_message() {
        let (engine, store, sender) = flaky_engine();
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        engine.enqueue_at(message("M2", "C2", "U2", t0()), t0()).await.expect("enqueue");
        store.fail_reads(cooldown_key(&UserId("U1".to_owned()))).await;

        let now = due(engine.policy());
        let report = engine.run_tick_at(now).await.expect("tick");

        assert_eq!((report.sent, report.deferred), (1, 1));
        assert_eq!(sender.calls().await, vec![("C2".to_owned(), "U2".to_owned())]);
        let snapshot = engine.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.get("C1").expect("channel").messages.len(), 1);
        assert!(snapshot.get("C2").expect("channel").messages.is_empty());

        store.heal().await;
        let retry = engine.run_tick_at(now + Duration::seconds(30)).await.expect("tick");
        assert_eq!(retry.sent, 1);
        assert_eq!(sender.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn cooldown_write_failure_withholds_reply_without_requeue() {
        let (engine, store, sender) = flaky_engine();
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        store.fail_writes(cooldown_key(&UserId("U1".to_owned()))).await;

        let report = engine.run_tick_at(due(engine.policy())).await.expect("tick");

        assert_eq!((report.sent, report.failed_sends), (0, 1));
        assert!(sender.calls().await.is_empty());
        assert_eq!(engine.snapshot().await.expect("snapshot").queued_messages(), 0);
        assert_eq!(stored_cooldown(store.as_ref(), "U1").await, None);
    }

    #[tokio::test]
    async fn failed_collection_save_leaves_tick_without_effect() {
        let (engine, store, sender) = flaky_engine();
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        store.fail_writes(CHANNELS_KEY.to_owned()).await;

        let now = due(engine.policy());
        let result = engine.run_tick_at(now).await;

        assert!(matches!(result, Err(EngineError::Save(StoreError::Unavailable(_)))));
        assert!(sender.calls().await.is_empty());
        assert_eq!(stored_cooldown(store.as_ref(), "U1").await, None);
        assert_eq!(engine.snapshot().await.expect("snapshot").queued_messages(), 1);

        store.heal().await;
        let retry = engine.run_tick_at(now + Duration::seconds(30)).await.expect("tick");
        assert_eq!(retry.sent, 1);
    }

    #[tokio::test]
    async fn enqueue_waits_for_in_flight_tick() {
        let (engine, store, sender) = flaky_engine();
        let engine = Arc::new(engine);
        engine.enqueue_at(message("M1", "C1", "U1", t0()), t0()).await.expect("enqueue");
        store.hold_cooldown_read.store(true, Ordering::SeqCst);

        let now = due(engine.policy());
        let tick = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run_tick_at(now).await }
        });
        store.reached.notified().await;

        let enqueue = tokio::spawn({
            let engine = engine.clone();
            async move { engine.enqueue_at(message("M2", "C1", "U2", now), now).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!enqueue.is_finished(), "enqueue must wait for the tick's state lock");

        store.release.notify_one();
        let report = tick.await.expect("join").expect("tick");
        assert!(enqueue.await.expect("join").expect("enqueue").queued);

        assert_eq!(report.sent, 1);
        assert_eq!(sender.calls().await, vec![("C1".to_owned(), "U1".to_owned())]);
        let snapshot = engine.snapshot().await.expect("snapshot");
        let ids = snapshot.get("C1").expect("channel").messages.iter().map(|m| m.id.0.clone());
        assert_eq!(ids.collect::<Vec<_>>(), vec!["M2"]);
    }
}
