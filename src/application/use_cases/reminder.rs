use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::{
        due_selection::{DueComparator, day_after, select_due},
        entities::subscription::SubscriptionRecord,
    },
    use_cases::{
        renewal::SubscriptionRepo,
        subscription::{SpendSummary, SubscriptionUseCases},
    },
};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

/// History of reminders already sent.
#[async_trait]
pub trait ReminderLogRepo: Send + Sync {
    /// Owners that received a reminder on `day`.
    async fn owners_notified_on(&self, day: NaiveDate) -> AppResult<HashSet<Uuid>>;
    async fn record_sent(&self, entries: &[ReminderLogEntry]) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderItem {
    pub subscription_id: Uuid,
    pub owner_id: Uuid,
    pub service_name: String,
    pub cost: Decimal,
    pub next_renewal_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub owner_id: Uuid,
    pub contact: String,
    pub items: Vec<ReminderItem>,
    pub total: Decimal,
    /// Monthly-equivalent spend of the owners behind this address, if it could be read.
    pub monthly_spend: Option<SpendSummary>,
}

impl ReminderPayload {
    pub fn subject(&self) -> String {
        let n = self.items.len();
        format!(
            "Renewal Reminder: {} subscription{}",
            n,
            if n == 1 { "" } else { "s" }
        )
    }

    pub fn html_body(&self) -> String {
        let lines: String = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "<li><strong>{}</strong> - ${} (renews on {})</li>",
                    escape_html(&item.service_name),
                    money(item.cost),
                    item.next_renewal_date.format("%Y-%m-%d")
                )
            })
            .collect();

        let spend = self
            .monthly_spend
            .map(|s| {
                format!(
                    "<p>Your {} active {} ${} per month.</p>",
                    s.active_count,
                    if s.active_count == 1 { "subscription costs" } else { "subscriptions cost" },
                    money(s.monthly_total)
                )
            })
            .unwrap_or_default();

        format!(
            "<p>Hello,</p>\
             <p>This is a reminder about your upcoming subscription renewals:</p>\
             <ul>{}</ul>\
             <p><strong>Total amount: ${}</strong></p>\
             {}\
             <p>Thank you for using SubTrack!</p>",
            lines,
            money(self.total),
            spend
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedOwner {
    pub owner_id: Uuid,
    pub subscription_count: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderGrouping {
    /// One payload per contact address.
    pub payloads: BTreeMap<String, ReminderPayload>,
    pub unresolved: Vec<UnresolvedOwner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderLogEntry {
    pub owner_id: Uuid,
    pub contact: String,
    pub subscription_id: Uuid,
    pub service_name: String,
    pub renewal_date: NaiveDate,
    pub amount: Decimal,
    pub sent_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFailure {
    pub contact: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderOutcome {
    /// Active subscriptions renewing tomorrow.
    pub due_count: usize,
    /// Owners skipped because they were already reminded today.
    pub already_notified: usize,
    pub delivered: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
    pub unresolved: Vec<UnresolvedOwner>,
}

/// Groups tomorrow's renewals into one payload per contact address.
///
/// Each owner is looked up once. An owner without a contact address, or whose
/// lookup fails, is logged and reported in `unresolved`; the rest of the batch
/// is unaffected.
pub async fn group_for_reminder(
    due_tomorrow: Vec<SubscriptionRecord>,
    users: &dyn UserDirectory,
) -> ReminderGrouping {
    let mut by_owner: HashMap<Uuid, Vec<SubscriptionRecord>> = HashMap::new();
    for sub in due_tomorrow {
        by_owner.entry(sub.owner_id).or_default().push(sub);
    }

    let mut grouping = ReminderGrouping::default();

    for (owner_id, subs) in by_owner {
        let contact = match users.get_email_by_id(owner_id).await {
            Ok(Some(email)) if !email.trim().is_empty() => email,
            Ok(_) => {
                warn!(owner_id = %owner_id, "No contact address for owner, skipping reminder");
                grouping.unresolved.push(UnresolvedOwner {
                    owner_id,
                    subscription_count: subs.len(),
                    reason: "no contact address".into(),
                });
                continue;
            }
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Owner lookup failed, skipping reminder");
                grouping.unresolved.push(UnresolvedOwner {
                    owner_id,
                    subscription_count: subs.len(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let payload = grouping
            .payloads
            .entry(contact.clone())
            .or_insert_with(|| ReminderPayload {
                owner_id,
                contact,
                items: Vec::new(),
                total: Decimal::ZERO,
                monthly_spend: None,
            });
        for sub in subs {
            payload.total += sub.cost;
            payload.items.push(ReminderItem {
                subscription_id: sub.id,
                owner_id: sub.owner_id,
                service_name: sub.service_name,
                cost: sub.cost,
                next_renewal_date: sub.next_renewal_date,
            });
        }
    }

    for payload in grouping.payloads.values_mut() {
        payload.items.sort_by(|a, b| {
            a.service_name
                .cmp(&b.service_name)
                .then(a.subscription_id.cmp(&b.subscription_id))
        });
    }
    grouping.unresolved.sort_by_key(|u| u.owner_id);

    grouping
}

#[derive(Clone)]
pub struct ReminderUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    users: Arc<dyn UserDirectory>,
    email: Arc<dyn EmailSender>,
    log: Arc<dyn ReminderLogRepo>,
    spending: SubscriptionUseCases,
    max_concurrent_sends: usize,
}

impl ReminderUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        users: Arc<dyn UserDirectory>,
        email: Arc<dyn EmailSender>,
        log: Arc<dyn ReminderLogRepo>,
        max_concurrent_sends: usize,
    ) -> Self {
        Self {
            spending: SubscriptionUseCases::new(Arc::clone(&subscriptions)),
            subscriptions,
            users,
            email,
            log,
            max_concurrent_sends: max_concurrent_sends.max(1),
        }
    }

    /// Emails every owner with subscriptions renewing the day after `today`.
    ///
    /// Only failing to read the subscriptions aborts the pass. Lookup and
    /// delivery failures are isolated per owner and reported in the outcome.
    #[instrument(skip(self))]
    pub async fn run_reminder_pass(&self, today: NaiveDate) -> AppResult<ReminderOutcome> {
        let Some(tomorrow) = day_after(today) else {
            return Ok(ReminderOutcome::default());
        };

        let candidates = self.subscriptions.list_active_renewing_on(tomorrow).await?;
        let mut due = select_due(candidates, today, DueComparator::EqualTo);
        let due_count = due.len();

        let notified = match self.log.owners_notified_on(today).await {
            Ok(owners) => owners,
            Err(e) => {
                warn!(error = %e, "Could not read reminder log, sending to every owner");
                HashSet::new()
            }
        };
        let skipped_owners: HashSet<Uuid> = due
            .iter()
            .map(|s| s.owner_id)
            .filter(|id| notified.contains(id))
            .collect();
        due.retain(|s| !skipped_owners.contains(&s.owner_id));

        let mut grouping = group_for_reminder(due, self.users.as_ref()).await;
        self.attach_monthly_spend(&mut grouping).await;
        let (delivered, failed) = self.dispatch(grouping.payloads.values().cloned()).await;

        let entries: Vec<ReminderLogEntry> = delivered
            .iter()
            .filter_map(|contact| grouping.payloads.get(contact))
            .flat_map(|p| log_entries(p, today))
            .collect();
        if !entries.is_empty() {
            if let Err(e) = self.log.record_sent(&entries).await {
                error!(error = %e, count = entries.len(), "Failed to record sent reminders");
            }
        }

        info!(
            due = due_count,
            already_notified = skipped_owners.len(),
            delivered = delivered.len(),
            failed = failed.len(),
            unresolved = grouping.unresolved.len(),
            "Reminder pass finished"
        );

        Ok(ReminderOutcome {
            due_count,
            already_notified: skipped_owners.len(),
            delivered,
            failed,
            unresolved: grouping.unresolved,
        })
    }

    /// Adds each recipient's monthly-equivalent spend. A failed read only drops
    /// that line from the email.
    async fn attach_monthly_spend(&self, grouping: &mut ReminderGrouping) {
        for payload in grouping.payloads.values_mut() {
            let mut owners: Vec<Uuid> = payload.items.iter().map(|i| i.owner_id).collect();
            owners.sort();
            owners.dedup();

            match self.spending.spend_summary_for_owners(&owners).await {
                Ok(summary) => payload.monthly_spend = Some(summary),
                Err(e) => {
                    warn!(contact = %payload.contact, error = %e, "Could not compute monthly spend");
                }
            }
        }
    }

    /// Sends every payload concurrently and waits for all of them.
    async fn dispatch(
        &self,
        payloads: impl Iterator<Item = ReminderPayload>,
    ) -> (Vec<String>, Vec<DeliveryFailure>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_sends));
        let mut handles = Vec::new();

        for payload in payloads {
            let email = Arc::clone(&self.email);
            let sem = Arc::clone(&semaphore);
            let contact = payload.contact.clone();

            handles.push((
                contact,
                tokio::spawn(async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Internal(e.to_string()))?;
                    email
                        .send(&payload.contact, &payload.subject(), &payload.html_body())
                        .await
                }),
            ));
        }

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for (contact, handle) in handles {
            match handle.await {
                Ok(Ok(())) => delivered.push(contact),
                Ok(Err(e)) => {
                    error!(contact = %contact, error = %e, "Failed to send renewal reminder");
                    failed.push(DeliveryFailure {
                        contact,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(contact = %contact, error = %e, "Reminder send task panicked");
                    failed.push(DeliveryFailure {
                        contact,
                        error: e.to_string(),
                    });
                }
            }
        }

        (delivered, failed)
    }
}

fn log_entries(payload: &ReminderPayload, sent_on: NaiveDate) -> Vec<ReminderLogEntry> {
    payload
        .items
        .iter()
        .map(|item| ReminderLogEntry {
            owner_id: item.owner_id,
            contact: payload.contact.clone(),
            subscription_id: item.subscription_id,
            service_name: item.service_name.clone(),
            renewal_date: item.next_renewal_date,
            amount: item.cost,
            sent_on,
        })
        .collect()
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
