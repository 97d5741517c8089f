use chrono::Utc;
use entity::enums::{CampaignStatus, EmailLogStatus, RecipientStatus};
use entity::{campaign, campaign_recipient, campaign_smtp_account, email_log};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::error::EngineError;

use super::Store;

/// One page of the per-campaign attempt log (`EmailLog` rows), optionally
/// filtered by status, for the `RestartCampaign`'s down-stream query
/// contract in §6 ("per-campaign attempt log, paginated, filterable by
/// status").
#[derive(Debug, Clone)]
pub struct EmailLogPage {
    pub items: Vec<email_log::Model>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
}

impl Store {
    /// {COMPLETED,FAILED,PAUSED} -> RUNNING with a full reset: every
    /// recipient goes back to PENDING, every prior EmailLog for the
    /// campaign is deleted, and sent/failed/bounce counters are zeroed.
    /// Not callable from CANCELLED (§4.5.1).
    pub async fn restart_campaign(&self, campaign_id: i32) -> Result<campaign::Model, EngineError> {
        let txn = self.db.begin().await?;

        let camp = campaign::Entity::find_by_id(campaign_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {campaign_id} not found")))?;

        const RESTARTABLE: [CampaignStatus; 3] =
            [CampaignStatus::Completed, CampaignStatus::Failed, CampaignStatus::Paused];
        if !RESTARTABLE.contains(&camp.status) {
            return Err(EngineError::Precondition(format!(
                "campaign {campaign_id} is {:?}, restart requires COMPLETED, FAILED or PAUSED",
                camp.status
            )));
        }

        email_log::Entity::delete_many()
            .filter(email_log::Column::CampaignId.eq(campaign_id))
            .exec(&txn)
            .await?;

        let recipients = campaign_recipient::Entity::find()
            .filter(campaign_recipient::Column::CampaignId.eq(campaign_id))
            .all(&txn)
            .await?;
        for recipient in recipients {
            let mut active: campaign_recipient::ActiveModel = recipient.into();
            active.status = Set(RecipientStatus::Pending);
            active.sent_at = Set(None);
            active.failed_reason = Set(None);
            active.smtp_account_id = Set(None);
            active.update(&txn).await?;
        }

        let mut active: campaign::ActiveModel = camp.into();
        active.status = Set(CampaignStatus::Running);
        active.started_at = Set(Some(Utc::now()));
        active.paused_at = Set(None);
        active.completed_at = Set(None);
        active.sent_count = Set(0);
        active.failed_count = Set(0);
        active.bounce_count = Set(0);
        active.bounce_rate = Set(0.0);
        let camp = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(campaign_id, "campaign restarted with full reset");
        Ok(camp)
    }

    /// Flips every still-unclaimed QUEUED recipient back to PENDING, used
    /// by `ResumeCampaign` so a pause doesn't strand recipients that were
    /// claimed by a tick but never reached the wire.
    pub async fn reset_queued_to_pending(&self, campaign_id: i32) -> Result<(), EngineError> {
        let queued = campaign_recipient::Entity::find()
            .filter(campaign_recipient::Column::CampaignId.eq(campaign_id))
            .filter(campaign_recipient::Column::Status.eq(RecipientStatus::Queued))
            .all(self.db.as_ref())
            .await?;
        for recipient in queued {
            let mut active: campaign_recipient::ActiveModel = recipient.into();
            active.status = Set(RecipientStatus::Pending);
            active.update(self.db.as_ref()).await?;
        }
        Ok(())
    }

    /// Deep copy with status DRAFT: same template and SmtpAccount refs,
    /// fresh PENDING recipient rows (never the source's terminal statuses,
    /// per the open-question decision in DESIGN.md), zeroed counters.
    pub async fn duplicate_campaign(&self, campaign_id: i32, new_name: String) -> Result<campaign::Model, EngineError> {
        let txn = self.db.begin().await?;

        let source = campaign::Entity::find_by_id(campaign_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {campaign_id} not found")))?;

        let recipients = campaign_recipient::Entity::find()
            .filter(campaign_recipient::Column::CampaignId.eq(campaign_id))
            .order_by_asc(campaign_recipient::Column::Id)
            .all(&txn)
            .await?;

        let account_links = campaign_smtp_account::Entity::find()
            .filter(campaign_smtp_account::Column::CampaignId.eq(campaign_id))
            .all(&txn)
            .await?;

        let copy = campaign::ActiveModel {
            user_id: Set(source.user_id),
            name: Set(new_name),
            template_id: Set(source.template_id),
            status: Set(CampaignStatus::Draft),
            scheduled_at: Set(None),
            settings: Set(source.settings.clone()),
            total_recipients: Set(recipients.len() as i32),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for link in account_links {
            campaign_smtp_account::ActiveModel {
                campaign_id: Set(copy.id),
                smtp_account_id: Set(link.smtp_account_id),
            }
            .insert(&txn)
            .await?;
        }

        for recipient in recipients {
            campaign_recipient::ActiveModel {
                campaign_id: Set(copy.id),
                email: Set(recipient.email),
                first_name: Set(recipient.first_name),
                last_name: Set(recipient.last_name),
                variables: Set(recipient.variables),
                status: Set(RecipientStatus::Pending),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(copy)
    }

    /// Forbidden while RUNNING; every other status may be deleted. Child
    /// rows cascade via the schema's foreign keys.
    pub async fn delete_campaign(&self, campaign_id: i32) -> Result<(), EngineError> {
        let camp = self.get_campaign(campaign_id).await?;
        if camp.status == CampaignStatus::Running {
            return Err(EngineError::Precondition("cannot delete a running campaign".into()));
        }
        camp.delete(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn list_email_logs(
        &self,
        campaign_id: i32,
        status: Option<EmailLogStatus>,
        page: u64,
        page_size: u64,
    ) -> Result<EmailLogPage, EngineError> {
        let mut query = email_log::Entity::find()
            .filter(email_log::Column::CampaignId.eq(campaign_id))
            .order_by_asc(email_log::Column::Id);

        if let Some(status) = status {
            query = query.filter(email_log::Column::Status.eq(status));
        }

        let paginator = query.paginate(self.db.as_ref(), page_size.max(1));
        let total_items = paginator.num_items().await?;
        let items = paginator.fetch_page(page).await?;

        Ok(EmailLogPage { items, page, page_size, total_items })
    }
}
