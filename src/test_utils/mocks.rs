//! In-memory mock implementations of the use case ports.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::subscription::{RenewalUpdate, SubscriptionRecord},
    use_cases::{
        reminder::{EmailSender, ReminderLogEntry, ReminderLogRepo, UserDirectory},
        renewal::SubscriptionRepo,
    },
};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

/// In-memory implementation of SubscriptionRepo for testing.
///
/// Relies on the trait's default client-side filtering for the due queries.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, SubscriptionRecord>>,
    fail_next_commit: AtomicBool,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<SubscriptionRecord>) -> Self {
        let map = subscriptions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            subscriptions: Mutex::new(map),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Make the next commit fail after all updates have been staged.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, id: Uuid) -> Option<SubscriptionRecord> {
        self.subscriptions.lock().unwrap().get(&id).cloned()
    }

    /// All subscriptions ordered by id (for test assertions).
    pub fn get_all(&self) -> Vec<SubscriptionRecord> {
        let mut all: Vec<_> = self.subscriptions.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        all
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect())
    }

    async fn list_active_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status.is_active() && s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn commit_renewals(&self, updates: &[RenewalUpdate]) -> AppResult<u64> {
        let mut subscriptions = self.subscriptions.lock().unwrap();

        // Stage on a copy; it only replaces the live map if the commit succeeds.
        let mut staged = subscriptions.clone();
        let now = Utc::now();
        let mut changed = 0;
        for update in updates {
            if let Some(sub) = staged.get_mut(&update.id) {
                if sub.next_renewal_date == update.previous_renewal_date && sub.status.is_active() {
                    sub.next_renewal_date = update.next_renewal_date;
                    sub.updated_at = now;
                    changed += 1;
                }
            }
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }

        *subscriptions = staged;
        Ok(changed)
    }
}

// ============================================================================
// InMemoryUserDirectory
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserDirectory {
    pub emails: Mutex<HashMap<Uuid, String>>,
    failing: Mutex<HashSet<Uuid>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<(Uuid, &str)>) -> Self {
        let map = users
            .into_iter()
            .map(|(id, email)| (id, email.to_string()))
            .collect();
        Self {
            emails: Mutex::new(map),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Lookups for `user_id` return a database error.
    pub fn fail_lookup_for(&self, user_id: Uuid) {
        self.failing.lock().unwrap().insert(user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(AppError::Database("Database operation failed".into()));
        }
        Ok(self.emails.lock().unwrap().get(&user_id).cloned())
    }
}

// ============================================================================
// RecordingEmailSender
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Records every successful send; fails for the configured recipients.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    failing: HashSet<String>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        if self.failing.contains(to) {
            return Err(AppError::Email(format!("mailbox unavailable: {to}")));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// InMemoryReminderLog
// ============================================================================

#[derive(Default)]
pub struct InMemoryReminderLog {
    entries: Mutex<Vec<ReminderLogEntry>>,
    fail_reads: AtomicBool,
}

impl InMemoryReminderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<ReminderLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderLogRepo for InMemoryReminderLog {
    async fn owners_notified_on(&self, day: NaiveDate) -> AppResult<HashSet<Uuid>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.sent_on == day)
            .map(|e| e.owner_id)
            .collect())
    }

    async fn record_sent(&self, entries: &[ReminderLogEntry]) -> AppResult<()> {
        self.entries.lock().unwrap().extend_from_slice(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_subscription, date};

    #[tokio::test]
    async fn test_default_due_filter_uses_active_set() {
        let due = create_test_subscription(|s| s.next_renewal_date = date(2025, 3, 1));
        let not_due = create_test_subscription(|s| s.next_renewal_date = date(2025, 3, 2));
        let due_id = due.id;
        let repo = InMemorySubscriptionRepo::with_subscriptions(vec![due, not_due]);

        let listed = repo.list_active_due_before(date(2025, 3, 2)).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due_id);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let sub = create_test_subscription(|s| s.next_renewal_date = date(2025, 3, 1));
        let repo = InMemorySubscriptionRepo::with_subscriptions(vec![sub.clone()]);
        repo.fail_next_commit();

        let update = RenewalUpdate {
            id: sub.id,
            previous_renewal_date: date(2025, 3, 1),
            next_renewal_date: date(2025, 4, 1),
        };
        assert!(repo.commit_renewals(&[update]).await.is_err());
        assert_eq!(repo.get(sub.id).unwrap(), sub);

        assert_eq!(repo.commit_renewals(&[update]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_repo() {
        let repo = InMemorySubscriptionRepo::new();
        assert!(repo.list_active().await.unwrap().is_empty());
    }
}
