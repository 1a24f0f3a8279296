//! Per-rule alarm suppression
//!
//! The tracker lives in process memory and is lost on restart, so the first
//! cycle after a restart may raise an alarm for a rule that fired shortly
//! before. Alarms themselves are persisted; only the suppression window is not.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::storage::schema::ThresholdRule;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CooldownEntry {
    last_alarm_at: DateTime<Utc>,

    /// Cooldown of the rule at the time the alarm was raised
    window: Duration,
}

/// Time of the last alarm raised per rule id
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    entries: HashMap<i64, CooldownEntry>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the rule never fired or its cooldown has fully elapsed
    pub fn is_expired(&self, rule: &ThresholdRule, now: DateTime<Utc>) -> bool {
        match self.entries.get(&rule.id) {
            Some(entry) => now - entry.last_alarm_at >= rule.cooldown(),
            None => true,
        }
    }

    /// Remember that `rule` raised an alarm at `at`. Call only after the
    /// alarm has been stored.
    pub fn record(&mut self, rule: &ThresholdRule, at: DateTime<Utc>) {
        self.entries.insert(
            rule.id,
            CooldownEntry {
                last_alarm_at: at,
                window: rule.cooldown(),
            },
        );
    }

    pub fn last_alarm_at(&self, rule_id: i64) -> Option<DateTime<Utc>> {
        self.entries.get(&rule_id).map(|entry| entry.last_alarm_at)
    }

    /// Rules still suppressed at `now`
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|entry| now - entry.last_alarm_at < entry.window)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
