use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::debug;

use crate::core::{Error, Result, SyncLevel};
use crate::protocol::Message;
use crate::time::util::signed_diff;

/// One in-flight SYNC_START -> DELAY_REQUEST -> DELAY_RESPONSE exchange
#[derive(Debug, Clone)]
pub struct PendingSyncAttempt {
    /// The candidate time source
    pub source: SocketAddr,
    /// Level announced in the triggering SYNC_START
    pub declared_level: SyncLevel,
    /// T1: source clock when the SYNC_START was sent
    pub source_timestamp: u64,
    /// T2: our natural clock when the SYNC_START arrived
    pub local_receive_time: u64,
    /// T3: our natural clock when the DELAY_REQUEST went out
    pub request_sent_at: u64,
    key: delay_queue::Key,
}

impl PendingSyncAttempt {
    /// The SYNC_START that opened this attempt
    pub fn announcement(&self) -> Message {
        Message::SyncStart {
            level: self.declared_level,
            timestamp: self.source_timestamp,
        }
    }
}

/// Outcome of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub source: SocketAddr,
    /// Level this node takes on by following the source
    pub level: SyncLevel,
    /// Local natural clock minus source clock
    pub offset_ms: i64,
    /// Estimated one-way network delay
    pub delay_ms: i64,
}

impl Measurement {
    /// Offset and delay from the four exchange timestamps
    ///
    /// offset = ((T2 - T1) + (T3 - T4)) / 2, delay = ((T2 - T1) - (T3 - T4)) / 2
    fn from_exchange(attempt: &PendingSyncAttempt, level: SyncLevel, t4: u64) -> Self {
        let forward = signed_diff(attempt.local_receive_time, attempt.source_timestamp);
        let backward = signed_diff(attempt.request_sent_at, t4);
        let clamp = |v: i128| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64;

        Measurement {
            source: attempt.source,
            level,
            offset_ms: clamp((forward + backward) / 2),
            delay_ms: clamp((forward - backward) / 2),
        }
    }
}

/// Per-source delay measurement state machine
///
/// A source is either idle (no entry) or awaiting its DELAY_RESPONSE. A new
/// SYNC_START from a source that is already awaiting replaces the attempt and
/// restarts its deadline.
pub struct DelayMeasurement {
    timeout: Duration,
    pending: HashMap<SocketAddr, PendingSyncAttempt>,
    deadlines: DelayQueue<SocketAddr>,
}

impl DelayMeasurement {
    pub fn new(timeout: Duration) -> Self {
        DelayMeasurement {
            timeout,
            pending: HashMap::new(),
            deadlines: DelayQueue::new(),
        }
    }

    /// Idle -> AwaitingDelayResponse
    ///
    /// `request_sent_at` is read just before the DELAY_REQUEST is sent.
    /// Returns true if an earlier attempt for the same source was superseded.
    pub fn begin(
        &mut self,
        source: SocketAddr,
        declared_level: SyncLevel,
        source_timestamp: u64,
        local_receive_time: u64,
        request_sent_at: u64,
    ) -> bool {
        let previous_key = self.pending.get(&source).map(|previous| previous.key.clone());
        let superseded = previous_key.is_some();
        let key = match previous_key {
            Some(key) => {
                self.deadlines.reset(&key, self.timeout);
                key
            }
            None => self.deadlines.insert(source, self.timeout),
        };

        self.pending.insert(
            source,
            PendingSyncAttempt {
                source,
                declared_level,
                source_timestamp,
                local_receive_time,
                request_sent_at,
                key,
            },
        );

        superseded
    }

    /// AwaitingDelayResponse -> Idle on a DELAY_RESPONSE
    ///
    /// The attempt is discarded whether or not validation succeeds.
    pub fn complete(
        &mut self,
        source: SocketAddr,
        level: SyncLevel,
        timestamp: u64,
    ) -> Result<Measurement> {
        let attempt = self.pending.remove(&source).ok_or_else(|| {
            Error::protocol("DELAY_RESPONSE without a pending sync attempt")
        })?;
        self.deadlines.remove(&attempt.key);

        if level != attempt.declared_level {
            return Err(Error::protocol(format!(
                "DELAY_RESPONSE level {} differs from SYNC_START level {}",
                level.0, attempt.declared_level.0
            )));
        }
        let own_level = attempt.declared_level.next().ok_or_else(|| {
            Error::sync(format!(
                "source level {} leaves no valid level",
                attempt.declared_level.0
            ))
        })?;

        let measurement = Measurement::from_exchange(&attempt, own_level, timestamp);
        debug!(
            source = %source,
            offset_ms = measurement.offset_ms,
            delay_ms = measurement.delay_ms,
            "delay measurement complete"
        );
        Ok(measurement)
    }

    /// Waits for the next attempt whose deadline elapses
    ///
    /// Resolves to `None` immediately when nothing is pending. Cancel safe.
    pub async fn next_expired(&mut self) -> Option<PendingSyncAttempt> {
        loop {
            let expired = self.deadlines.next().await?;
            let source = expired.into_inner();
            if let Some(attempt) = self.pending.remove(&source) {
                return Some(attempt);
            }
        }
    }

    pub fn is_pending(&self, source: &SocketAddr) -> bool {
        self.pending.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
