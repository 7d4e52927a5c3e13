use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Tokens this close to expiry are treated as already expired.
pub const FRESHNESS_MARGIN: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: u64) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn expiring_in(value: impl Into<String>, lifetime: Duration, now: u64) -> Self {
        Self::new(value, now.saturating_add(lifetime.as_secs()))
    }

    pub fn is_fresh_at(&self, now: u64) -> bool {
        self.expires_at > now.saturating_add(FRESHNESS_MARGIN.as_secs())
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(unix_now())
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_needs_more_than_ten_minutes_left() {
        let now = 1_700_000_000;
        let token = AccessToken::expiring_in("abc", Duration::from_secs(3600), now);
        assert!(token.is_fresh_at(now));
        assert!(token.is_fresh_at(now + 3600 - 601));
        assert!(!token.is_fresh_at(now + 3600 - 600));
        assert!(!token.is_fresh_at(now + 4000));
    }

    #[test]
    fn short_lived_token_is_never_fresh() {
        let token = AccessToken::expiring_in("abc", Duration::from_secs(300), 10);
        assert!(!token.is_fresh_at(10));
    }

    #[test]
    fn clock_is_past_the_epoch() {
        let now = unix_now();
        assert!(now > 1_700_000_000);
        assert!(AccessToken::expiring_in("abc", Duration::from_secs(3600), now).is_fresh());
    }
}
