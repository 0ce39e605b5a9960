use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;

/// Sliding window message counter per user.
#[derive(Debug)]
pub struct SpamTracker {
    window: chrono::Duration,
    max_messages: usize,
    history: HashMap<UserId, VecDeque<DateTime<Utc>>>,
}

impl SpamTracker {
    pub fn new(window: Duration, max_messages: usize) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::days(1)),
            max_messages,
            history: HashMap::new(),
        }
    }

    /// Record a message sent at `at`. Returns true when the user went over the limit.
    pub fn record(&mut self, user: UserId, at: DateTime<Utc>) -> bool {
        let window = self.window;

        // forget users whose last message left the window
        self.history.retain(|_, sent| sent.back().is_some_and(|last| at - *last < window));

        let timestamps = self.history.entry(user).or_default();

        timestamps.push_back(at);
        timestamps.retain(|sent| at - *sent < window);

        timestamps.len() > self.max_messages
    }

    pub fn clear(&mut self, user: UserId) {
        self.history.remove(&user);
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const USER: UserId = UserId::new(948517362313863198);

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 19, 20, 0, 0).unwrap()
    }

    fn tracker() -> SpamTracker {
        SpamTracker::new(Duration::from_secs(60), 5)
    }

    #[test]
    fn limit_is_exclusive() {
        let mut tracker = tracker();

        let flagged: Vec<bool> = (0..6)
            .map(|i| tracker.record(USER, start() + chrono::Duration::seconds(i)))
            .collect();

        assert_eq!(vec![false, false, false, false, false, true], flagged);
    }

    #[test]
    fn old_messages_leave_the_window() {
        let mut tracker = tracker();

        for i in 0..5 {
            tracker.record(USER, start() + chrono::Duration::seconds(i));
        }

        // the first message is exactly a window old and no longer counts
        assert!(!tracker.record(USER, start() + chrono::Duration::seconds(60)));
        assert!(tracker.record(USER, start() + chrono::Duration::seconds(60)));
    }

    #[test]
    fn users_are_counted_separately() {
        let mut tracker = tracker();
        let other = UserId::new(1);

        for i in 0..5 {
            tracker.record(USER, start() + chrono::Duration::seconds(i));
        }

        assert!(!tracker.record(other, start() + chrono::Duration::seconds(6)));
        assert!(tracker.record(USER, start() + chrono::Duration::seconds(6)));
    }

    #[test]
    fn clear_forgets_the_user() {
        let mut tracker = tracker();

        for i in 0..6 {
            tracker.record(USER, start() + chrono::Duration::seconds(i));
        }
        tracker.clear(USER);

        assert!(!tracker.record(USER, start() + chrono::Duration::seconds(7)));
    }

    #[test]
    fn quiet_users_are_forgotten() {
        let mut tracker = tracker();
        let other = UserId::new(1);

        tracker.record(other, start());
        tracker.record(USER, start() + chrono::Duration::seconds(30));
        assert_eq!(2, tracker.history.len());

        tracker.record(USER, start() + chrono::Duration::seconds(61));

        assert_eq!(1, tracker.history.len());
        assert!(tracker.history.contains_key(&USER));
    }
}
