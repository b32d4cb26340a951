//! Message bus adapter (C2), `spec.md` §4.2, grounded in
//! `examples/original_source/services/transcription-collector/main.py`'s
//! stream startup/consume/reclaim code and
//! `streaming/processors.py`'s segment/speaker-event caching.

use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use vexa_domain::error::{Error, Result};

/// Thin wrapper around a `redis::aio::ConnectionManager`: every method here
/// corresponds to one Redis command sequence the original Python service
/// issued directly against `aioredis.Redis`.
#[derive(Clone)]
pub struct Bus {
    conn: ConnectionManager,
}

#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub id: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub id: String,
    pub idle_ms: i64,
}

impl Bus {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Idempotent group creation: `BUSYGROUP` (group already exists) is not
    /// an error, matching the original's `xgroup_create` startup handling.
    pub async fn ensure_consumer_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Reads new messages (`>`) for this consumer, blocking up to `block_ms`.
    pub async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>> {
        let mut conn = self.conn.clone();
        let opts = redis::streams::StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block_ms as usize);
        let reply: redis::streams::StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await?;
        Ok(flatten_stream_reply(reply))
    }

    pub async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(stream, group, ids).await?;
        Ok(())
    }

    /// Lists pending entries for the whole group (`XPENDING ... - + count`).
    pub async fn pending_range(
        &self,
        stream: &str,
        group: &str,
        count: usize,
    ) -> Result<Vec<PendingEntry>> {
        let mut conn = self.conn.clone();
        let reply: Vec<(String, String, i64, i64)> = redis::cmd("XPENDING")
            .arg(stream)
            .arg(group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(reply
            .into_iter()
            .map(|(id, _consumer, idle_ms, _deliveries)| PendingEntry { id, idle_ms })
            .collect())
    }

    /// Claims the given message ids for `consumer`, re-requiring
    /// `min_idle_ms` so a message claimed by a concurrent reclaimer in the
    /// meantime is not double-claimed.
    pub async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: i64,
        ids: &[String],
    ) -> Result<Vec<StreamMessage>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream).arg(group).arg(consumer).arg(min_idle_ms);
        for id in ids {
            cmd.arg(id);
        }
        let reply: redis::streams::StreamClaimReply = cmd.query_async(&mut conn).await?;
        Ok(reply
            .ids
            .into_iter()
            .map(|entry| StreamMessage {
                id: entry.id,
                fields: entry
                    .map
                    .into_iter()
                    .filter_map(|(k, v)| match v {
                        redis::Value::BulkString(bytes) => {
                            Some((k, String::from_utf8_lossy(&bytes).to_string()))
                        }
                        _ => None,
                    })
                    .collect(),
            })
            .collect())
    }

    /// Caches one promoted segment in the `meeting:<id>:segments` hash and
    /// marks the meeting active, matching the original's pipelined
    /// `SADD active_meetings` / `EXPIRE` / `HSET` sequence.
    pub async fn cache_segment(
        &self,
        meeting_id: i64,
        start_time_key: &str,
        segment_json: &str,
        ttl_secs: i64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let hash_key = format!("meeting:{meeting_id}:segments");
        redis::pipe()
            .atomic()
            .sadd("active_meetings", meeting_id.to_string())
            .expire(&hash_key, ttl_secs)
            .hset(&hash_key, start_time_key, segment_json)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get_cached_segments(&self, meeting_id: i64) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let hash_key = format!("meeting:{meeting_id}:segments");
        Ok(conn.hgetall(&hash_key).await?)
    }

    /// Meeting ids with at least one segment buffered in Redis, swept by the
    /// promotion loop each tick.
    pub async fn active_meeting_ids(&self) -> Result<Vec<i64>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.smembers("active_meetings").await?;
        Ok(raw.iter().filter_map(|s| s.parse().ok()).collect())
    }

    pub async fn remove_active_meeting(&self, meeting_id: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem("active_meetings", meeting_id.to_string()).await?;
        Ok(())
    }

    /// Removes promoted (or unrecoverable) segment fields from a meeting's
    /// hash once the promotion loop has dealt with them.
    pub async fn delete_cached_segments(&self, meeting_id: i64, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let hash_key = format!("meeting:{meeting_id}:segments");
        let _: i64 = conn.hdel(&hash_key, keys).await?;
        Ok(())
    }

    /// Records one speaker event in a per-session sorted set, scored by its
    /// relative timestamp in milliseconds.
    pub async fn record_speaker_event(
        &self,
        session_uid: &str,
        event_json: &str,
        relative_timestamp_ms: f64,
        ttl_secs: i64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = format!("speaker_events:{session_uid}");
        redis::pipe()
            .atomic()
            .zadd(&key, event_json, relative_timestamp_ms)
            .expire(&key, ttl_secs)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn speaker_events_for_session(&self, session_uid: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let key = format!("speaker_events:{session_uid}");
        let members: Vec<(String, f64)> = conn.zrangebyscore_withscores(&key, "-inf", "+inf").await?;
        Ok(members)
    }

    /// Deletes the session's cached speaker events, matching the original's
    /// `session_end` cleanup.
    pub async fn clear_speaker_events(&self, session_uid: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = format!("speaker_events:{session_uid}");
        let _: i64 = conn.del(&key).await?;
        Ok(())
    }

    /// Publishes a command (e.g. a stop request) on the bot's dedicated
    /// control channel.
    pub async fn publish_bot_command(&self, session_uid: &str, command_json: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let channel = format!("bot_commands:{session_uid}");
        let _: i64 = conn.publish(&channel, command_json).await?;
        Ok(())
    }
}

fn flatten_stream_reply(reply: redis::streams::StreamReadReply) -> Vec<StreamMessage> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| StreamMessage {
            id: entry.id,
            fields: entry
                .map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    redis::Value::BulkString(bytes) => {
                        Some((k, String::from_utf8_lossy(&bytes).to_string()))
                    }
                    _ => None,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn flatten_stream_reply_extracts_payload_field() {
        let reply = redis::streams::StreamReadReply {
            keys: vec![redis::streams::StreamKey {
                key: "transcription_segments".to_string(),
                ids: vec![redis::streams::StreamId {
                    id: "1-0".to_string(),
                    map: {
                        let mut m = StdHashMap::new();
                        m.insert(
                            "payload".to_string(),
                            redis::Value::BulkString(b"{\"type\":\"transcription\"}".to_vec()),
                        );
                        m
                    },
                }],
            }],
        };
        let messages = flatten_stream_reply(reply);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "1-0");
        assert_eq!(
            messages[0].fields.get("payload").unwrap(),
            "{\"type\":\"transcription\"}"
        );
    }
}
