//! One-time-code challenge state.

use identity_provider::CodeSent;

/// The in-flight login challenge. At most one exists at a time, owned by
/// the runtime and destroyed on successful verify or flow restart.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    /// Normalized address the code was sent to.
    pub email: String,
    /// Provider device handle for consume/resend calls.
    pub device_id: String,
    /// Provider pre-auth session handle.
    pub pre_auth_session_id: String,
    /// Wrong codes entered against this challenge.
    pub attempts: u32,
    /// Seconds until resending is allowed again.
    pub cooldown_seconds_remaining: u32,
}

impl OtpChallenge {
    pub fn new(email: String, sent: CodeSent, cooldown_secs: u32) -> Self {
        Self {
            email,
            device_id: sent.device_id,
            pre_auth_session_id: sent.pre_auth_session_id,
            attempts: 0,
            cooldown_seconds_remaining: cooldown_secs,
        }
    }

    pub fn can_resend(&self) -> bool {
        self.cooldown_seconds_remaining == 0
    }

    /// Restarts the cooldown window and forgives previous attempts.
    /// Applied after a successful resend.
    pub fn reset(&mut self, cooldown_secs: u32) {
        self.attempts = 0;
        self.cooldown_seconds_remaining = cooldown_secs;
    }

    /// One countdown step. Returns true when the counter moved.
    pub fn tick(&mut self) -> bool {
        if self.cooldown_seconds_remaining == 0 {
            return false;
        }
        self.cooldown_seconds_remaining -= 1;
        true
    }

    /// Records a provider rejection and returns the new attempt count.
    pub fn record_failed_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts_remaining(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.attempts)
    }

    pub fn attempts_exhausted(&self, max_attempts: u32) -> bool {
        self.attempts >= max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> OtpChallenge {
        OtpChallenge::new(
            "user@example.com".to_string(),
            CodeSent {
                device_id: "device-1".to_string(),
                pre_auth_session_id: "pas-1".to_string(),
            },
            60,
        )
    }

    #[test]
    fn test_new_challenge_starts_cooled_down() {
        let challenge = challenge();
        assert_eq!(challenge.cooldown_seconds_remaining, 60);
        assert_eq!(challenge.attempts, 0);
        assert!(!challenge.can_resend());
    }

    #[test]
    fn test_tick_counts_down_and_stops_at_zero() {
        let mut challenge = challenge();
        challenge.cooldown_seconds_remaining = 2;

        assert!(challenge.tick());
        assert_eq!(challenge.cooldown_seconds_remaining, 1);
        assert!(challenge.tick());
        assert_eq!(challenge.cooldown_seconds_remaining, 0);
        assert!(challenge.can_resend());

        // No underflow once expired.
        assert!(!challenge.tick());
        assert_eq!(challenge.cooldown_seconds_remaining, 0);
    }

    #[test]
    fn test_failed_attempts_accumulate_until_reset() {
        let mut challenge = challenge();
        assert_eq!(challenge.record_failed_attempt(), 1);
        assert_eq!(challenge.record_failed_attempt(), 2);
        assert_eq!(challenge.attempts_remaining(5), 3);
        assert!(!challenge.attempts_exhausted(5));

        for _ in 0..3 {
            challenge.record_failed_attempt();
        }
        assert!(challenge.attempts_exhausted(5));
        assert_eq!(challenge.attempts_remaining(5), 0);

        challenge.reset(60);
        assert_eq!(challenge.attempts, 0);
        assert_eq!(challenge.cooldown_seconds_remaining, 60);
        assert!(!challenge.attempts_exhausted(5));
    }
}
