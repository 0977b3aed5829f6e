use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What `confirm_payment` does when the registration is already paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentRepeatPolicy {
    /// Re-write `paid` and record another payment row.
    #[default]
    Allow,
    /// Fail with `PreconditionFailed`.
    Reject,
    /// Return the latest existing payment without writing.
    Ignore,
}

impl FromStr for PaymentRepeatPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(PaymentRepeatPolicy::Allow),
            "reject" => Ok(PaymentRepeatPolicy::Reject),
            "ignore" => Ok(PaymentRepeatPolicy::Ignore),
            _ => Err(format!("Unknown payment repeat policy: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 30),
        })
    }
}

/// Tick period of each automation sweep.
#[derive(Clone, Debug)]
pub struct SweepIntervals {
    pub open_registration: Duration,
    pub start_check_in: Duration,
    pub exclude_no_shows: Duration,
    pub close_late_registration: Duration,
    pub archive: Duration,
    pub purge_action_log: Duration,
    pub reminders: Duration,
    pub prize_pool: Duration,
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self {
            open_registration: Duration::from_secs(60 * 60),
            start_check_in: Duration::from_secs(15 * 60),
            exclude_no_shows: Duration::from_secs(5 * 60),
            close_late_registration: Duration::from_secs(10 * 60),
            archive: Duration::from_secs(24 * 60 * 60),
            purge_action_log: Duration::from_secs(7 * 24 * 60 * 60),
            reminders: Duration::from_secs(30 * 60),
            prize_pool: Duration::from_secs(60 * 60),
        }
    }
}

impl SweepIntervals {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            Duration::from_secs(env_or(&format!("SWEEP_{name}_SECS"), fallback.as_secs()))
        };

        Self {
            open_registration: secs("OPEN_REGISTRATION", defaults.open_registration),
            start_check_in: secs("START_CHECK_IN", defaults.start_check_in),
            exclude_no_shows: secs("EXCLUDE_NO_SHOWS", defaults.exclude_no_shows),
            close_late_registration: secs(
                "CLOSE_LATE_REGISTRATION",
                defaults.close_late_registration,
            ),
            archive: secs("ARCHIVE", defaults.archive),
            purge_action_log: secs("PURGE_ACTION_LOG", defaults.purge_action_log),
            reminders: secs("REMINDERS", defaults.reminders),
            prize_pool: secs("PRIZE_POOL", defaults.prize_pool),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub seats_per_table: i32,
    pub max_tables: i32,
    pub payment_repeat_policy: PaymentRepeatPolicy,
    pub action_log_retention_months: u32,
    pub archive_after_days: i64,
    pub sweeps: SweepIntervals,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seats_per_table: 9,
            max_tables: 20,
            payment_repeat_policy: PaymentRepeatPolicy::Allow,
            action_log_retention_months: 6,
            archive_after_days: 30,
            sweeps: SweepIntervals::default(),
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the environment. Missing or unparseable values
    /// keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            seats_per_table: env_or("SEATS_PER_TABLE", defaults.seats_per_table).max(1),
            max_tables: env_or("MAX_TABLES", defaults.max_tables).max(1),
            payment_repeat_policy: env_or("PAYMENT_REPEAT_POLICY", defaults.payment_repeat_policy),
            action_log_retention_months: env_or(
                "ACTION_LOG_RETENTION_MONTHS",
                defaults.action_log_retention_months,
            ),
            archive_after_days: env_or("ARCHIVE_AFTER_DAYS", defaults.archive_after_days),
            sweeps: SweepIntervals::from_env(),
        }
    }

    pub fn seat_capacity(&self) -> usize {
        (self.seats_per_table as usize) * (self.max_tables as usize)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_policy_parses_case_insensitively() {
        assert_eq!(
            "Reject".parse::<PaymentRepeatPolicy>(),
            Ok(PaymentRepeatPolicy::Reject)
        );
        assert_eq!(
            "ignore".parse::<PaymentRepeatPolicy>(),
            Ok(PaymentRepeatPolicy::Ignore)
        );
        assert!("sometimes".parse::<PaymentRepeatPolicy>().is_err());
    }

    #[test]
    fn test_defaults_match_room_layout() {
        let config = EngineConfig::default();
        assert_eq!(config.seat_capacity(), 180);
        assert_eq!(config.payment_repeat_policy, PaymentRepeatPolicy::Allow);
        assert_eq!(config.sweeps.exclude_no_shows, Duration::from_secs(300));
    }
}
