use std::str::FromStr;
use std::time::Duration;

/// Notification hub configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Capacity of each session's outbound queue. A session whose queue is
    /// full when an event arrives is disconnected.
    pub outbound_queue_capacity: usize,
    /// Capacity of the hub's command mailbox.
    pub hub_mailbox_capacity: usize,
    /// Interval between server-initiated pings.
    pub ping_interval: Duration,
    /// How long a session may go without a pong before it is dropped.
    pub pong_wait: Duration,
    /// Deadline for writing a single frame to the socket.
    pub write_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8086,
            outbound_queue_capacity: 256,
            hub_mailbox_capacity: 1024,
            ping_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; missing or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            port: parsed_var("PORT", defaults.port),
            outbound_queue_capacity: parsed_var(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            )
            .max(1),
            hub_mailbox_capacity: parsed_var("HUB_MAILBOX_CAPACITY", defaults.hub_mailbox_capacity)
                .max(1),
            ping_interval: secs_var("PING_INTERVAL_SECS", defaults.ping_interval),
            pong_wait: secs_var("PONG_WAIT_SECS", defaults.pong_wait),
            write_wait: secs_var("WRITE_WAIT_SECS", defaults.write_wait),
        };
        config.normalized()
    }

    /// Clamp the ping interval below the pong wait, otherwise every healthy
    /// session would time out before its next ping goes out.
    pub fn normalized(mut self) -> Self {
        if self.ping_interval >= self.pong_wait {
            let clamped = self.pong_wait * 9 / 10;
            tracing::warn!(
                ping_interval = ?self.ping_interval,
                pong_wait = ?self.pong_wait,
                clamped = ?clamped,
                "ping interval must be shorter than pong wait; clamping"
            );
            self.ping_interval = clamped;
        }
        self
    }
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn secs_var(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
