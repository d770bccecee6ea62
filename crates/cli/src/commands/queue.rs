use chrono::{DateTime, Utc};
use deskbot_core::domain::channel::{ChannelCollection, CHANNELS_KEY};
use deskbot_core::domain::cooldown::COOLDOWN_KEY_PREFIX;
use deskbot_db::SqlStateStore;
use serde::Serialize;

use crate::commands::{connect, load_config, runtime, CommandResult};

#[derive(Debug, Serialize)]
struct QueueReport {
    command: &'static str,
    status: &'static str,
    channels: Vec<ChannelSummary>,
    totals: QueueTotals,
}

#[derive(Debug, Serialize)]
struct ChannelSummary {
    channel_id: String,
    last_agent_message_time: DateTime<Utc>,
    queued: usize,
    oldest_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct QueueTotals {
    channels: usize,
    queued_messages: usize,
    cooldown_entries: usize,
    skipped_channels: usize,
    skipped_messages: usize,
}

pub fn run() -> CommandResult {
    let config = match load_config("queue") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("queue") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool =
            connect(&config).await.map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'state_entry'",
        )
        .fetch_one(&pool)
        .await
        .map_err(|error| ("db_query", error.to_string(), 5u8))?;
        if tables == 0 {
            pool.close().await;
            return Err((
                "not_migrated",
                "state table is missing; run `deskbot migrate` first".to_string(),
                6u8,
            ));
        }

        let store = SqlStateStore::new(pool.clone());
        let stored =
            store.load(CHANNELS_KEY).await.map_err(|error| ("db_query", error.to_string(), 5u8))?;
        let cooldowns = store
            .keys_with_prefix(COOLDOWN_KEY_PREFIX)
            .await
            .map_err(|error| ("db_query", error.to_string(), 5u8))?;
        pool.close().await;

        Ok::<_, (&'static str, String, u8)>(build_report(stored, cooldowns.len()))
    });

    match result {
        Ok(report) => match serde_json::to_string(&report) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("queue", "serialization", error.to_string(), 7),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("queue", error_class, message, exit_code)
        }
    }
}

fn build_report(stored: Option<serde_json::Value>, cooldown_entries: usize) -> QueueReport {
    let (collection, decode_report) = ChannelCollection::decode(stored);

    let channels = collection
        .channels
        .iter()
        .map(|channel| ChannelSummary {
            channel_id: channel.id.clone(),
            last_agent_message_time: channel.last_agent_message_time,
            queued: channel.messages.len(),
            oldest_message_at: channel.messages.iter().map(|message| message.timestamp).min(),
        })
        .collect::<Vec<_>>();

    QueueReport {
        command: "queue",
        status: "ok",
        totals: QueueTotals {
            channels: channels.len(),
            queued_messages: collection.queued_messages(),
            cooldown_entries,
            skipped_channels: decode_report.skipped_channels,
            skipped_messages: decode_report.skipped_messages,
        },
        channels,
    }
}
