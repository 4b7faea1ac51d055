//! Configuration for the RCON connection

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::packet::{MAX_COMMAND_BODY, PACKET_OVERHEAD};

/// Default request/response deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Default keepalive interval. Must stay below [`MAX_KEEPALIVE`]: BattlEye
/// tends to drop sessions idle for longer than ~45 seconds.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Keepalive ceiling; intervals at or above this clamp to the default.
pub const MAX_KEEPALIVE: Duration = Duration::from_secs(45);

/// Default sleep used while waiting for a free sequence id under load.
/// Zero disables sleeping (busy-spin).
pub const DEFAULT_MICRO_SLEEP: Duration = Duration::from_millis(1);

/// Default body capacity budgeted for the single UDP read buffer; the
/// packet overhead is added on top.
pub const DEFAULT_BUFFER_SIZE: u16 = 1024;

/// Default number of login attempts before `open` gives up.
pub const DEFAULT_LOGIN_ATTEMPTS: u32 = 1;

/// Connection configuration builder.
///
/// ```rust
/// use bercon::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .deadline(Duration::from_secs(3))
///     .keepalive(Duration::from_secs(10))
///     .start_keepalive(true);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum time a `send` waits for its reply (covers queueing too)
    pub deadline: Duration,
    /// Interval between keepalive packets when enabled
    pub keepalive: Duration,
    /// Sleep between free-sequence probes under contention; zero busy-spins
    pub micro_sleep: Duration,
    /// Size of the single UDP read buffer (body plus packet overhead);
    /// also bounds outgoing packet bodies
    pub buffer_size: u16,
    /// Whether the manager emits periodic keepalives
    pub keepalive_enabled: bool,
    /// Login attempts before `open` fails; retried only on timeouts
    pub login_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            keepalive: DEFAULT_KEEPALIVE,
            micro_sleep: DEFAULT_MICRO_SLEEP,
            buffer_size: DEFAULT_BUFFER_SIZE + PACKET_OVERHEAD,
            keepalive_enabled: false,
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request/response deadline. Zero resets to the default.
    pub fn deadline(mut self, d: Duration) -> Self {
        self.deadline = if d.is_zero() { DEFAULT_DEADLINE } else { d };
        self
    }

    /// Set the keepalive interval. Zero or anything at or above
    /// [`MAX_KEEPALIVE`] clamps to the default.
    pub fn keepalive(mut self, d: Duration) -> Self {
        self.keepalive = clamp_keepalive(d);
        self
    }

    /// Set the micro-sleep used while probing for a free sequence id.
    /// Zero means busy-spin.
    pub fn micro_sleep(mut self, d: Duration) -> Self {
        self.micro_sleep = d;
        self
    }

    /// Set the read-buffer size, capped at the protocol maximum body plus
    /// header overhead.
    pub fn buffer_size(mut self, size: u16) -> Self {
        self.buffer_size = size.min(MAX_COMMAND_BODY as u16 + PACKET_OVERHEAD);
        self
    }

    /// Enable or disable periodic keepalives.
    pub fn start_keepalive(mut self, enabled: bool) -> Self {
        self.keepalive_enabled = enabled;
        self
    }

    /// Set how many times the login handshake is attempted.
    pub fn login_attempts(mut self, attempts: u32) -> Self {
        self.login_attempts = attempts.max(1);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < PACKET_OVERHEAD {
            return Err(Error::BadSize);
        }

        Ok(())
    }
}

fn clamp_keepalive(d: Duration) -> Duration {
    if d.is_zero() || d >= MAX_KEEPALIVE {
        DEFAULT_KEEPALIVE
    } else {
        d
    }
}

/// Runtime-adjustable view of the configuration, shared between the facade
/// and the connection tasks. Plain atomics: every field is read per
/// operation and written only by the facade setters.
#[derive(Debug)]
pub(crate) struct Tunables {
    deadline_ms: AtomicU64,
    keepalive_ms: AtomicU64,
    micro_sleep_us: AtomicU64,
    buffer_size: AtomicU16,
    keepalive_enabled: AtomicBool,
    login_attempts: AtomicU32,
}

impl Tunables {
    pub fn new(config: &Config) -> Self {
        Self {
            deadline_ms: AtomicU64::new(config.deadline.as_millis() as u64),
            keepalive_ms: AtomicU64::new(config.keepalive.as_millis() as u64),
            micro_sleep_us: AtomicU64::new(config.micro_sleep.as_micros() as u64),
            buffer_size: AtomicU16::new(config.buffer_size),
            keepalive_enabled: AtomicBool::new(config.keepalive_enabled),
            login_attempts: AtomicU32::new(config.login_attempts),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms.load(Ordering::Relaxed))
    }

    pub fn set_deadline(&self, d: Duration) {
        let d = if d.is_zero() { DEFAULT_DEADLINE } else { d };
        self.deadline_ms
            .store(d.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms.load(Ordering::Relaxed))
    }

    pub fn set_keepalive(&self, d: Duration) {
        self.keepalive_ms
            .store(clamp_keepalive(d).as_millis() as u64, Ordering::Relaxed);
    }

    pub fn micro_sleep(&self) -> Duration {
        Duration::from_micros(self.micro_sleep_us.load(Ordering::Relaxed))
    }

    pub fn set_micro_sleep(&self, d: Duration) {
        self.micro_sleep_us
            .store(d.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn buffer_size(&self) -> u16 {
        self.buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_buffer_size(&self, size: u16) {
        let size = size.min(MAX_COMMAND_BODY as u16 + PACKET_OVERHEAD);
        self.buffer_size.store(size, Ordering::Relaxed);
    }

    pub fn keepalive_enabled(&self) -> bool {
        self.keepalive_enabled.load(Ordering::Relaxed)
    }

    pub fn set_keepalive_enabled(&self, enabled: bool) {
        self.keepalive_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn login_attempts(&self) -> u32 {
        self.login_attempts.load(Ordering::Relaxed)
    }

    pub fn set_login_attempts(&self, attempts: u32) {
        self.login_attempts.store(attempts.max(1), Ordering::Relaxed);
    }
}
