use entity::enums::{CampaignStatus, EmailLogStatus, RecipientStatus};
use entity::{campaign, campaign_recipient, email_log};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::error::EngineError;

use super::Store;

/// One recipient pulled off the unclaimed set, tagged with a sequence
/// number stable across retries of the same tick (§4.5.2 step 5 depends on
/// this for deterministic round-robin account assignment).
#[derive(Debug, Clone)]
pub struct ClaimedRecipient {
    pub recipient: campaign_recipient::Model,
    pub sequence: u64,
}

/// Post-update counters, returned so the Sender can detect completion or
/// auto-pause conditions without a second round trip.
#[derive(Debug, Clone, Copy)]
pub struct CampaignSnapshot {
    pub status: CampaignStatus,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub bounce_count: i32,
    pub bounce_rate: f64,
}

impl From<&campaign::Model> for CampaignSnapshot {
    fn from(m: &campaign::Model) -> Self {
        Self {
            status: m.status,
            total_recipients: m.total_recipients,
            sent_count: m.sent_count,
            failed_count: m.failed_count,
            bounce_count: m.bounce_count,
            bounce_rate: m.bounce_rate,
        }
    }
}

impl CampaignSnapshot {
    pub fn is_fully_attempted(&self) -> bool {
        self.sent_count + self.failed_count >= self.total_recipients
    }
}

/// The terminal result of a single `email-send` attempt, as determined by
/// the Sender after talking to the transport (or failing to).
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent { message_id: Option<String> },
    Failed { error_message: String, is_bounce: bool },
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Store {
    /// Pulls up to `limit` recipients with status PENDING or QUEUED, flips
    /// them to QUEUED, and hands back a stable per-campaign sequence number
    /// for each. Calling again with nothing left to claim returns an empty
    /// vec rather than erroring.
    pub async fn claim_next_batch(
        &self,
        campaign_id: i32,
        limit: u64,
    ) -> Result<Vec<ClaimedRecipient>, EngineError> {
        let txn = self.db.begin().await?;

        let candidates = campaign_recipient::Entity::find()
            .filter(campaign_recipient::Column::CampaignId.eq(campaign_id))
            .filter(
                campaign_recipient::Column::Status
                    .eq(RecipientStatus::Pending)
                    .or(campaign_recipient::Column::Status.eq(RecipientStatus::Queued)),
            )
            .order_by_asc(campaign_recipient::Column::Id)
            .paginate(&txn, limit.max(1))
            .fetch_page(0)
            .await?;

        let already_queued_count = campaign_recipient::Entity::find()
            .filter(campaign_recipient::Column::CampaignId.eq(campaign_id))
            .filter(campaign_recipient::Column::Status.ne(RecipientStatus::Pending))
            .count(&txn)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for (offset, model) in candidates.into_iter().enumerate() {
            let sequence = already_queued_count + offset as u64;
            let was_pending = model.status == RecipientStatus::Pending;
            let recipient = if was_pending {
                let mut active: campaign_recipient::ActiveModel = model.into();
                active.status = Set(RecipientStatus::Queued);
                active.update(&txn).await?
            } else {
                model
            };
            claimed.push(ClaimedRecipient { recipient, sequence });
        }

        txn.commit().await?;
        Ok(claimed)
    }

    /// Creates the EmailLog row representing the current attempt for a
    /// recipient, in status QUEUED with an empty subject snapshot (the
    /// Sender fills in the real subject at render time, per §4.5.2 step 4).
    pub async fn create_queued_email_log(
        &self,
        campaign_id: i32,
        recipient_id: i32,
        smtp_account_id: i32,
    ) -> Result<email_log::Model, EngineError> {
        let log = email_log::ActiveModel {
            campaign_id: Set(campaign_id),
            recipient_id: Set(recipient_id),
            smtp_account_id: Set(smtp_account_id),
            status: Set(EmailLogStatus::Queued),
            subject_snapshot: Set(String::new()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(log)
    }

    /// Applies a terminal outcome to one EmailLog, the owning recipient, and
    /// the campaign's rolling counters, all inside one transaction so the
    /// invariants in spec §8 (sent+failed ≤ total, bounceRate formula) never
    /// observe a partial update. No-op if the EmailLog is already terminal.
    pub async fn record_attempt_outcome(
        &self,
        email_log_id: i32,
        outcome: SendOutcome,
    ) -> Result<CampaignSnapshot, EngineError> {
        let txn = self.db.begin().await?;

        let log = email_log::Entity::find_by_id(email_log_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::StaleJob(format!("email log {email_log_id} no longer exists")))?;

        if log.status == EmailLogStatus::Sent || log.status == EmailLogStatus::Failed {
            let camp = campaign::Entity::find_by_id(log.campaign_id)
                .one(&txn)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("campaign {} not found", log.campaign_id)))?;
            txn.commit().await?;
            return Ok(CampaignSnapshot::from(&camp));
        }

        let recipient = campaign_recipient::Entity::find_by_id(log.recipient_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("recipient {} not found", log.recipient_id)))?;

        let mut camp = campaign::Entity::find_by_id(log.campaign_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {} not found", log.campaign_id)))?;

        let now = chrono::Utc::now();
        let mut log_active: email_log::ActiveModel = log.clone().into();
        let mut recipient_active: campaign_recipient::ActiveModel = recipient.into();
        recipient_active.smtp_account_id = Set(Some(log.smtp_account_id));

        let is_bounce;
        match &outcome {
            SendOutcome::Sent { message_id } => {
                is_bounce = false;
                log_active.status = Set(EmailLogStatus::Sent);
                log_active.sent_at = Set(Some(now));
                log_active.message_id = Set(message_id.clone());
                recipient_active.status = Set(RecipientStatus::Sent);
                recipient_active.sent_at = Set(Some(now));
                camp.sent_count += 1;
            }
            SendOutcome::Failed { error_message, is_bounce: bounce } => {
                is_bounce = *bounce;
                log_active.status = Set(EmailLogStatus::Failed);
                log_active.failed_at = Set(Some(now));
                log_active.error_message = Set(Some(error_message.clone()));
                if is_bounce {
                    log_active.bounce_reason = Set(Some(error_message.clone()));
                }
                // §8 invariant 4: a COMPLETED campaign's recipients must all be
                // SENT or FAILED. `RecipientStatus::Bounced` is reserved for the
                // out-of-scope bounce-webhook-ingestion path, not this engine's
                // own SMTP-inferred bounce classification.
                recipient_active.status = Set(RecipientStatus::Failed);
                recipient_active.failed_reason = Set(Some(error_message.clone()));
                camp.failed_count += 1;
                if is_bounce {
                    camp.bounce_count += 1;
                }
            }
        }

        log_active.update(&txn).await?;
        recipient_active.update(&txn).await?;

        let attempted = camp.sent_count + camp.failed_count;
        camp.bounce_rate = round2(camp.bounce_count as f64 / attempted.max(1) as f64 * 100.0);

        let camp_id = camp.id;
        let is_fully_attempted = camp.status == CampaignStatus::Running
            && camp.sent_count + camp.failed_count >= camp.total_recipients;

        let mut camp_active: campaign::ActiveModel = camp.into();

        // §4.6 step 9: the Store completes the campaign transactionally as
        // soon as every recipient has a terminal attempt, in the same
        // transaction as the counter update so no other tick can observe a
        // fully-attempted RUNNING campaign in between.
        if is_fully_attempted {
            camp_active.status = Set(CampaignStatus::Completed);
            camp_active.completed_at = Set(Some(now));
        }

        let camp = camp_active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            campaign_id = camp_id,
            email_log_id,
            is_bounce,
            sent_count = camp.sent_count,
            failed_count = camp.failed_count,
            "recorded attempt outcome"
        );

        Ok(CampaignSnapshot::from(&camp))
    }
}
