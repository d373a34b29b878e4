//! HAR-style timing breakdown.
//!
//! The transport reports wall-clock checkpoints for a hop into a
//! [`RequestStats`]; [`Timing::from_stats`] turns them into the
//! blocked/dns/connect/ssl/send/wait/receive phases. `-1` marks a phase that
//! was not measured (e.g. no DNS lookup on a reused or IP-literal connection).

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, the clock every checkpoint uses.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Raw checkpoints for a single hop. Replaced, never reused, between hops.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestStats {
    /// Hop start.
    pub message_start: Option<f64>,
    /// Connection attempt started (before DNS).
    pub connection_time: Option<f64>,
    /// DNS lookup finished.
    pub lookup_time: Option<f64>,
    /// TCP connection established.
    pub connected_time: Option<f64>,
    /// TLS handshake started.
    pub secure_start_time: Option<f64>,
    /// TLS handshake finished.
    pub secure_connected_time: Option<f64>,
    /// Request fully written.
    pub sent_time: Option<f64>,
    /// First response byte.
    pub first_receive_time: Option<f64>,
    /// Response head parsed.
    pub receiving_time: Option<f64>,
    /// Last response byte.
    pub last_received_time: Option<f64>,
}

/// Checkpoint names a transport can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    ConnectionStart,
    LookupEnd,
    Connected,
    SecureStart,
    SecureConnected,
    Sent,
    FirstByte,
    Receiving,
    LastByte,
}

impl RequestStats {
    pub fn started_at(message_start: f64) -> Self {
        Self {
            message_start: Some(message_start),
            ..Self::default()
        }
    }

    /// Store a checkpoint. First-byte is recorded only once per hop.
    pub fn record(&mut self, checkpoint: Checkpoint, at: f64) {
        let slot = match checkpoint {
            Checkpoint::ConnectionStart => &mut self.connection_time,
            Checkpoint::LookupEnd => &mut self.lookup_time,
            Checkpoint::Connected => &mut self.connected_time,
            Checkpoint::SecureStart => &mut self.secure_start_time,
            Checkpoint::SecureConnected => &mut self.secure_connected_time,
            Checkpoint::Sent => &mut self.sent_time,
            Checkpoint::FirstByte => {
                if self.first_receive_time.is_some() {
                    return;
                }
                &mut self.first_receive_time
            }
            Checkpoint::Receiving => &mut self.receiving_time,
            Checkpoint::LastByte => &mut self.last_received_time,
        };
        *slot = Some(at);
    }
}

/// Derived timing phases in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timing {
    pub blocked: f64,
    pub dns: f64,
    pub connect: f64,
    pub ssl: f64,
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            blocked: 0.0,
            dns: -1.0,
            connect: -1.0,
            ssl: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
        }
    }
}

impl Timing {
    pub fn from_stats(stats: &RequestStats) -> Self {
        let sent = stats.sent_time.or(stats.message_start);
        let last_received = stats.last_received_time.or(stats.receiving_time);
        let lookup = stats.lookup_time.or(stats.message_start);

        let send = match (sent, stats.message_start) {
            (Some(sent), Some(start)) => (sent - start).max(0.0),
            _ => 0.0,
        };
        let dns = match (stats.lookup_time, stats.connection_time) {
            (Some(lookup), Some(connection)) => lookup - connection,
            _ => -1.0,
        };
        let connect = match (stats.connected_time, lookup) {
            (Some(connected), Some(lookup)) => connected - lookup,
            _ => -1.0,
        };
        let receive = match (last_received, stats.first_receive_time) {
            (Some(last), Some(first)) => (last - first).max(0.0),
            _ => 0.0,
        };
        let wait = match (stats.first_receive_time, sent) {
            (Some(first), Some(sent)) => (first - sent).max(0.0),
            _ => 0.0,
        };
        let ssl = match (stats.secure_start_time, stats.secure_connected_time) {
            (Some(start), Some(end)) => end - start,
            _ => -1.0,
        };

        Self {
            blocked: 0.0,
            dns,
            connect,
            ssl,
            send,
            wait,
            receive,
        }
    }

    /// Sum of all measured phases.
    pub fn total(&self) -> f64 {
        [
            self.blocked,
            self.dns,
            self.connect,
            self.ssl,
            self.send,
            self.wait,
            self.receive,
        ]
        .iter()
        .filter(|v| **v > 0.0)
        .sum()
    }
}
