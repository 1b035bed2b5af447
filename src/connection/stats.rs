//! Counters shared by every connection a factory opens.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the connections of one [`ConnectionFactory`](super::ConnectionFactory).
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections opened
    pub connections_opened: AtomicU64,
    /// Currently open connections
    pub active_connections: AtomicU64,
    /// Total commands sent
    pub commands_sent: AtomicU64,
    /// Error replies received from the store
    pub error_replies: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_reply(&self) {
        self.error_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// A point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            error_replies: self.error_replies.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Plain values read from [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_opened: u64,
    pub active_connections: u64,
    pub commands_sent: u64,
    pub error_replies: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_tracks_active() {
        let stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.connections_opened, 2);
        assert_eq!(snap.active_connections, 1);
    }

    #[test]
    fn test_byte_counters() {
        let stats = ConnectionStats::new();
        stats.bytes_written(14);
        stats.bytes_read(7);
        stats.command_sent();

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_written, 14);
        assert_eq!(snap.bytes_read, 7);
        assert_eq!(snap.commands_sent, 1);
    }
}
