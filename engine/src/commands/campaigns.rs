use std::time::Duration;

use chrono::Utc;
use entity::campaign;
use entity::enums::CampaignStatus;
use sea_orm::Set;

pub use crate::store::CreateCampaignCmd;
use crate::error::EngineError;
use crate::queue::JobQueue;
use crate::store::Store;

/// `CreateCampaign` (§6). Creates the campaign and its recipients
/// atomically via the Store, then — if no `scheduledAt` was given — tries
/// the `create-immediate` transition to RUNNING (§4.5.1). A campaign with
/// zero accepted recipients simply stays DRAFT rather than failing the
/// whole command: the create succeeded, it just has nothing to run yet.
pub async fn create_campaign(store: &Store, queue: &JobQueue, cmd: CreateCampaignCmd) -> Result<campaign::Model, EngineError> {
    let wants_immediate_start = cmd.scheduled_at.is_none();
    let created = store.create_campaign(cmd).await?;

    if wants_immediate_start {
        match start_campaign(store, queue, created.id).await {
            Ok(started) => return Ok(started),
            Err(EngineError::Precondition(reason)) => {
                tracing::info!(campaign_id = created.id, reason, "campaign created but not started");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(created)
}

/// `StartCampaign` (§6): {DRAFT, SCHEDULED, PAUSED} -> RUNNING. A no-op on
/// an already-RUNNING campaign (testable property #7). Fails with
/// `Precondition` if there are no recipients to send to.
pub async fn start_campaign(store: &Store, queue: &JobQueue, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let current = store.get_campaign(campaign_id).await?;
    if current.status == CampaignStatus::Running {
        return Ok(current);
    }

    if current.total_recipients == 0 {
        return Err(EngineError::Precondition(format!("campaign {campaign_id} has no recipients")));
    }

    let started_at = current.started_at;
    let started = store
        .transition_campaign(
            campaign_id,
            &[CampaignStatus::Draft, CampaignStatus::Scheduled, CampaignStatus::Paused],
            CampaignStatus::Running,
            |a| {
                a.paused_at = Set(None);
                if started_at.is_none() {
                    a.started_at = Set(Some(Utc::now()));
                }
            },
        )
        .await?;

    queue.enqueue_tick(campaign_id, Duration::ZERO).await?;
    Ok(started)
}

/// `PauseCampaign` (§6): RUNNING -> PAUSED. A no-op if already PAUSED
/// (testable property #7). Pending `email-send` jobs are not purged from
/// the broker; they gate on campaign status when they fire (§5).
pub async fn pause_campaign(store: &Store, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let current = store.get_campaign(campaign_id).await?;
    if current.status == CampaignStatus::Paused {
        return Ok(current);
    }

    store
        .transition_campaign(campaign_id, &[CampaignStatus::Running], CampaignStatus::Paused, |a| {
            a.paused_at = Set(Some(Utc::now()));
        })
        .await
}

/// `ResumeCampaign` (§6): PAUSED -> RUNNING. Flips any QUEUED-but-unclaimed
/// recipients back to PENDING before re-enqueuing a tick, so a pause never
/// strands a recipient claimed but not yet dispatched.
pub async fn resume_campaign(store: &Store, queue: &JobQueue, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let current = store.get_campaign(campaign_id).await?;
    if current.status == CampaignStatus::Running {
        return Ok(current);
    }

    let resumed = store
        .transition_campaign(campaign_id, &[CampaignStatus::Paused], CampaignStatus::Running, |a| {
            a.paused_at = Set(None);
        })
        .await?;

    store.reset_queued_to_pending(campaign_id).await?;
    queue.enqueue_tick(campaign_id, Duration::ZERO).await?;
    Ok(resumed)
}

/// `StopCampaign` (§6): {RUNNING, PAUSED, SCHEDULED} -> CANCELLED. A no-op
/// if already CANCELLED.
pub async fn stop_campaign(store: &Store, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let current = store.get_campaign(campaign_id).await?;
    if current.status == CampaignStatus::Cancelled {
        return Ok(current);
    }

    store
        .transition_campaign(
            campaign_id,
            &[CampaignStatus::Running, CampaignStatus::Paused, CampaignStatus::Scheduled],
            CampaignStatus::Cancelled,
            |a| a.completed_at = Set(Some(Utc::now())),
        )
        .await
}

/// `RestartCampaign` (§6): {COMPLETED, FAILED, PAUSED} -> RUNNING with a
/// full reset (every recipient back to PENDING, prior EmailLogs deleted,
/// counters zeroed).
pub async fn restart_campaign(store: &Store, queue: &JobQueue, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let restarted = store.restart_campaign(campaign_id).await?;
    queue.enqueue_tick(campaign_id, Duration::ZERO).await?;
    Ok(restarted)
}

/// `DeleteCampaign` (§6): forbidden while RUNNING.
pub async fn delete_campaign(store: &Store, campaign_id: i32) -> Result<(), EngineError> {
    store.delete_campaign(campaign_id).await
}

/// `DuplicateCampaign` (§6): deep copy with status DRAFT and fresh PENDING
/// recipient rows.
pub async fn duplicate_campaign(store: &Store, campaign_id: i32, new_name: String) -> Result<campaign::Model, EngineError> {
    store.duplicate_campaign(campaign_id, new_name).await
}
