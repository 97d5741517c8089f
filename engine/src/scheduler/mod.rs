pub mod pacing;

use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use entity::enums::CampaignStatus;
use rand::thread_rng;
use sea_orm::Set;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::queue::JobQueue;
use crate::store::settings::CampaignSettings;
use crate::store::Store;

const AUTO_PAUSE_MIN_ATTEMPTS: i32 = 10;

/// Runs the §4.5.2 tick algorithm for one campaign: claims the next batch
/// of unclaimed recipients, computes each recipient's dispatch delay and
/// SmtpAccount assignment, creates the EmailLog rows, and enqueues the
/// corresponding `email-send` jobs. Exits silently (per step 1) if the
/// campaign is no longer RUNNING by the time this tick is processed.
#[tracing::instrument(skip(store, queue, config), fields(campaign_id))]
pub async fn handle_tick(
    store: &Store,
    queue: &JobQueue,
    config: &EngineConfig,
    campaign_id: i32,
) -> Result<(), EngineError> {
    let camp = store.get_campaign(campaign_id).await?;
    if camp.status != CampaignStatus::Running {
        tracing::debug!(status = ?camp.status, "stale tick, campaign is not running");
        return Ok(());
    }

    let accounts = store.active_smtp_accounts_for_campaign(campaign_id).await?;
    if accounts.is_empty() {
        store
            .transition_campaign(campaign_id, &[CampaignStatus::Running], CampaignStatus::Failed, |a| {
                a.completed_at = Set(Some(Utc::now()));
            })
            .await?;
        tracing::warn!("campaign has no active smtp accounts, marking FAILED");
        return Ok(());
    }

    let remaining = (camp.total_recipients - camp.sent_count - camp.failed_count).max(0) as u64;
    let claimed = store.claim_next_batch(campaign_id, remaining.max(1)).await?;

    if claimed.is_empty() {
        if camp.sent_count + camp.failed_count >= camp.total_recipients {
            store
                .transition_campaign(campaign_id, &[CampaignStatus::Running], CampaignStatus::Completed, |a| {
                    a.completed_at = Set(Some(Utc::now()));
                })
                .await?;
        }
        return Ok(());
    }

    let settings = CampaignSettings::from_json(&camp.settings).resolved(config);
    let mut rng = thread_rng();
    let plans = pacing::plan_batch(&claimed, &accounts, settings, &mut rng);

    for plan in plans {
        let log = store
            .create_queued_email_log(campaign_id, plan.recipient_id, plan.smtp_account_id)
            .await?;
        queue
            .enqueue_send(log.id, 1, Duration::from_secs(plan.delay_secs))
            .await?;
    }

    Ok(())
}

/// Periodic job (§4.5.3), intended to run on a 60s ticker: promotes
/// SCHEDULED campaigns whose `scheduledAt` has elapsed into RUNNING,
/// provided they still have an active SmtpAccount and at least one
/// recipient, and fires an immediate tick for each one promoted.
pub async fn calendar_sweep(store: &Store, queue: &JobQueue) -> Result<(), EngineError> {
    let due = store.due_scheduled_campaigns(Utc::now()).await?;

    for camp in due {
        let accounts = store.active_smtp_accounts_for_campaign(camp.id).await?;
        if accounts.is_empty() || camp.total_recipients == 0 {
            tracing::warn!(campaign_id = camp.id, "scheduled campaign failed calendar validation");
            continue;
        }

        let promoted = store
            .transition_campaign(camp.id, &[CampaignStatus::Scheduled], CampaignStatus::Running, |a| {
                a.started_at = Set(Some(Utc::now()));
            })
            .await;

        match promoted {
            Ok(_) => queue.enqueue_tick(camp.id, Duration::ZERO).await?,
            Err(EngineError::Precondition(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// §4.5.4: the next instant at or after `now` that falls inside
/// `[office_hours_start, office_hours_end)` local-to-UTC hour-of-day. If
/// `now` is already inside the window, returns `now` unchanged.
pub fn next_office_hours_window(now: chrono::DateTime<Utc>, start: u32, end: u32) -> chrono::DateTime<Utc> {
    if start >= end {
        return now;
    }

    let hour = now.hour();
    if hour >= start && hour < end {
        return now;
    }

    let candidate_today = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), start, 0, 0)
        .single()
        .unwrap_or(now);

    if hour < start {
        candidate_today
    } else {
        candidate_today + ChronoDuration::days(1)
    }
}

/// True only if a post-outcome campaign snapshot should auto-pause:
/// `bounceRate > maxBounceRate` and at least 10 attempts have completed.
pub fn should_auto_pause(sent_count: i32, failed_count: i32, bounce_rate: f64, max_bounce_rate: f64) -> bool {
    let attempts = sent_count + failed_count;
    attempts >= AUTO_PAUSE_MIN_ATTEMPTS && bounce_rate > max_bounce_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_window_is_unchanged() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        assert_eq!(next_office_hours_window(now, 8, 18), now);
    }

    #[test]
    fn before_window_rolls_to_start_today() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        let next = next_office_hours_window(now, 8, 18);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 28, 8, 0, 0).unwrap());
    }

    #[test]
    fn after_window_rolls_to_start_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 20, 0, 0).unwrap();
        let next = next_office_hours_window(now, 8, 18);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 29, 8, 0, 0).unwrap());
    }

    #[test]
    fn auto_pause_requires_both_threshold_and_minimum_attempts() {
        assert!(!should_auto_pause(2, 9, 90.0, 5.0));
        assert!(should_auto_pause(0, 11, 100.0, 5.0));
        assert!(!should_auto_pause(20, 0, 2.0, 5.0));
    }
}
