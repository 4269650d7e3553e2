//! Runtime configuration.

use std::time::Duration;

use request_orchestrator::PollConfig;

/// Seconds a fresh challenge blocks resending.
pub const DEFAULT_RESEND_COOLDOWN_SECS: u32 = 60;

/// Wrong-code budget per challenge.
pub const DEFAULT_MAX_OTP_ATTEMPTS: u32 = 5;

/// Minimum accepted code length.
pub const DEFAULT_MIN_OTP_CODE_LEN: usize = 6;

/// Cadence of the background session re-validation loop.
pub const DEFAULT_SESSION_REFRESH_INTERVAL_SECS: u64 = 300;

/// Tunables for the gate runtime. Tests shrink the intervals; production
/// uses the defaults.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Cooldown installed on every successful send or resend.
    pub resend_cooldown_secs: u32,
    /// Wrong codes tolerated before verification is locked out.
    pub max_otp_attempts: u32,
    /// Codes shorter than this are rejected locally.
    pub min_otp_code_len: usize,
    /// Interval between background session re-validations.
    pub session_refresh_interval: Duration,
    /// Interval between cooldown countdown ticks.
    pub cooldown_tick_interval: Duration,
    /// Bounded poll used to pick up the profile right after verification.
    pub profile_poll: PollConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            resend_cooldown_secs: DEFAULT_RESEND_COOLDOWN_SECS,
            max_otp_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
            min_otp_code_len: DEFAULT_MIN_OTP_CODE_LEN,
            session_refresh_interval: Duration::from_secs(
                DEFAULT_SESSION_REFRESH_INTERVAL_SECS,
            ),
            cooldown_tick_interval: Duration::from_secs(1),
            profile_poll: PollConfig::default(),
        }
    }
}
