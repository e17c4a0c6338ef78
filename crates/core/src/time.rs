//! Time entry model - per-user time logged against a task.

use serde::{Deserialize, Serialize};
use crate::id::{EntryId, UserId};
use crate::session::UserContext;
use crate::Time;

/// Time logged by one user against one task.
///
/// An entry is *open* while `ended_at` is unset; at most one open entry
/// may exist per (task, user) pair. `minutes` stays 0 until the entry
/// is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Unique identifier
    pub id: EntryId,

    /// Owning user (auth-service id)
    pub user_id: UserId,

    /// Display name snapshot at entry creation
    pub user_name: String,

    /// Email snapshot at entry creation
    pub user_email: String,

    /// When the clock started
    pub started_at: Time,

    /// When the clock stopped; unset while running
    pub ended_at: Option<Time>,

    /// Whole minutes worked; 0 while the entry is open
    pub minutes: u32,
}

impl TimeEntry {
    /// Start a new open entry for the given user.
    pub fn open(ctx: &UserContext, now: Time) -> Self {
        Self {
            id: EntryId::new(),
            user_id: ctx.user_id.clone(),
            user_name: ctx.name.clone(),
            user_email: ctx.email.clone(),
            started_at: now,
            ended_at: None,
            minutes: 0,
        }
    }

    /// Synthesize an already-closed entry of the given duration,
    /// stamped as starting now. Used for retroactive logging.
    pub fn closed(ctx: &UserContext, now: Time, minutes: u32) -> Self {
        Self {
            id: EntryId::new(),
            user_id: ctx.user_id.clone(),
            user_name: ctx.name.clone(),
            user_email: ctx.email.clone(),
            started_at: now,
            ended_at: Some(now),
            minutes,
        }
    }

    /// Whether the clock is still running.
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Stop the clock and fix the duration.
    pub fn close(&mut self, now: Time) {
        self.ended_at = Some(now);
        self.minutes = minutes_between(self.started_at, now);
    }
}

/// Elapsed whole minutes between two instants, rounded to the nearest
/// minute. Negative spans (clock skew) collapse to 0.
pub fn minutes_between(start: Time, end: Time) -> u32 {
    let ms = (end - start).num_milliseconds().max(0);
    ((ms as f64) / 60_000.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn ctx() -> UserContext {
        UserContext::new("u-1", "Alma", "alma@example.com")
    }

    #[test]
    fn close_rounds_to_nearest_minute() {
        let start = Utc::now();
        let mut entry = TimeEntry::open(&ctx(), start);
        assert!(entry.is_open());
        assert_eq!(entry.minutes, 0);

        entry.close(start + Duration::seconds(90));
        assert!(!entry.is_open());
        assert_eq!(entry.minutes, 2);
    }

    #[test]
    fn sub_half_minute_rounds_down_to_zero() {
        let now = Utc::now();
        assert_eq!(minutes_between(now, now + Duration::seconds(29)), 0);
    }

    #[test]
    fn negative_span_is_zero() {
        let now = Utc::now();
        assert_eq!(minutes_between(now, now - Duration::minutes(5)), 0);
    }
}
