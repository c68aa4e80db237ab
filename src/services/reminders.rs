//! Periodic workshop reminder sweep.
//!
//! Each window sends at most one reminder per (recipient, workshop). The
//! notification row is claimed before sending through the unique index on
//! `(user_id, type, workshop_id)`, so concurrent sweeps cannot both send.

use std::collections::HashMap;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use time::{Duration, PrimitiveDateTime};

use crate::core::metrics;
use crate::core::security::fingerprint;
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::Workshop;
use crate::repositories;
use crate::services::mailer::MailMessage;

const TOLERANCE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReminderWindow {
    Day,
    Hour,
    TenMinutes,
}

impl ReminderWindow {
    pub(crate) const ALL: [ReminderWindow; 3] = [Self::Day, Self::Hour, Self::TenMinutes];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Day => "24H",
            Self::Hour => "1H",
            Self::TenMinutes => "10M",
        }
    }

    pub(crate) fn lookahead(self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Hour => Duration::hours(1),
            Self::TenMinutes => Duration::minutes(10),
        }
    }

    pub(crate) fn notification_type(self) -> String {
        format!("WORKSHOP_REMINDER_{}", self.label())
    }

    fn human(self) -> &'static str {
        match self {
            Self::Day => "24 hours",
            Self::Hour => "1 hour",
            Self::TenMinutes => "10 minutes",
        }
    }

    /// Inclusive start-time range matched by this window at `now`.
    pub(crate) fn bounds(self, now: PrimitiveDateTime) -> (PrimitiveDateTime, PrimitiveDateTime) {
        let target = now + self.lookahead();
        let tolerance = Duration::minutes(TOLERANCE_MINUTES);
        (target - tolerance, target + tolerance)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WindowReport {
    pub(crate) window: &'static str,
    pub(crate) workshops: usize,
    pub(crate) sent: usize,
    pub(crate) skipped: usize,
    pub(crate) failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SweepReport {
    pub(crate) windows: Vec<WindowReport>,
}

impl SweepReport {
    pub(crate) fn sent(&self) -> usize {
        self.windows.iter().map(|window| window.sent).sum()
    }

    pub(crate) fn failed(&self) -> usize {
        self.windows.iter().map(|window| window.failed).sum()
    }
}

pub(crate) async fn run_sweep(
    state: &AppState,
    now: PrimitiveDateTime,
) -> anyhow::Result<SweepReport> {
    let (day, hour, ten_minutes) = tokio::join!(
        sweep_window(state, now, ReminderWindow::Day),
        sweep_window(state, now, ReminderWindow::Hour),
        sweep_window(state, now, ReminderWindow::TenMinutes),
    );

    let report = SweepReport { windows: vec![day?, hour?, ten_minutes?] };
    tracing::info!(
        sent = report.sent(),
        failed = report.failed(),
        now = %format_primitive(now),
        "Workshop reminder sweep finished"
    );
    Ok(report)
}

async fn sweep_window(
    state: &AppState,
    now: PrimitiveDateTime,
    window: ReminderWindow,
) -> anyhow::Result<WindowReport> {
    let (from, to) = window.bounds(now);
    let workshops = repositories::workshops::list_starting_between(state.db(), from, to)
        .await
        .with_context(|| format!("Failed to load workshops for {} window", window.label()))?;

    let mut report = WindowReport {
        window: window.label(),
        workshops: workshops.len(),
        ..Default::default()
    };
    let kind = window.notification_type();

    for workshop in &workshops {
        let recipients = recipients(state, workshop)
            .await
            .with_context(|| format!("Failed to load recipients for workshop {}", workshop.id))?;

        for (user_id, email) in recipients {
            if email.trim().is_empty() {
                report.skipped += 1;
                continue;
            }

            let claimed = repositories::notifications::claim(
                state.db(),
                &user_id,
                &kind,
                &workshop.id,
                json!({ "workshopId": workshop.id, "window": window.label() }),
                now,
            )
            .await
            .context("Failed to record reminder notification")?;

            let Some(notification_id) = claimed else {
                report.skipped += 1;
                metrics::record_reminder(window.label(), "duplicate");
                continue;
            };

            match state.mailer().send(reminder_message(state, workshop, window, email)).await {
                Ok(()) => {
                    report.sent += 1;
                    metrics::record_reminder(window.label(), "sent");
                }
                Err(err) => {
                    report.failed += 1;
                    metrics::record_reminder(window.label(), "failed");
                    tracing::warn!(
                        error = %err,
                        workshop_id = %workshop.id,
                        user_id = %user_id,
                        window = window.label(),
                        "Failed to send workshop reminder"
                    );
                    // Unsent reminders must not block a retry within the tolerance band.
                    if let Err(err) =
                        repositories::notifications::release(state.db(), &notification_id).await
                    {
                        tracing::error!(
                            error = %err,
                            notification_id = %notification_id,
                            "Failed to release reminder claim"
                        );
                    }
                }
            }
        }
    }

    Ok(report)
}

/// The instructor first, then RESERVED users; each user once.
async fn recipients(
    state: &AppState,
    workshop: &Workshop,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    let mut user_ids = vec![workshop.instructor_id.clone()];
    for user_id in repositories::reservations::reserved_user_ids(state.db(), &workshop.id).await? {
        if !user_ids.contains(&user_id) {
            user_ids.push(user_id);
        }
    }

    let emails: HashMap<String, String> =
        repositories::users::find_emails(state.db(), &user_ids).await?.into_iter().collect();

    Ok(user_ids
        .into_iter()
        .filter_map(|user_id| emails.get(&user_id).cloned().map(|email| (user_id, email)))
        .collect())
}

fn reminder_message(
    state: &AppState,
    workshop: &Workshop,
    window: ReminderWindow,
    email: String,
) -> MailMessage {
    let join_url = state.settings().workshops().join_url(&workshop.id);
    tracing::debug!(recipient = %fingerprint(&email), window = window.label(), "Sending reminder");
    MailMessage {
        to: email,
        subject: format!("{} starts in {}", workshop.title, window.human()),
        text: format!(
            "\"{}\" starts at {} (UTC).\nJoin: {join_url}",
            workshop.title,
            format_primitive(workshop.start_time),
        ),
    }
}

#[cfg(test)]
mod tests;
