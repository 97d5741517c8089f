pub mod accounts;
pub mod batch;
pub mod lifecycle;
pub mod quota;
pub mod settings;

use std::sync::Arc;

use chrono::Utc;
use entity::enums::CampaignStatus;
use entity::{campaign, campaign_recipient, campaign_smtp_account, email_log, smtp_account, template, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::error::EngineError;

pub use accounts::{NewSmtpAccount, NewTemplate, NewUser};
pub use batch::{CampaignSnapshot, ClaimedRecipient, SendOutcome};
pub use lifecycle::EmailLogPage;
pub use quota::QuotaOutcome;
pub use settings::CampaignSettings;

/// Transactional persistence gateway over every §3 entity. Holds an `Arc`
/// so the worker can cheaply clone a handle into each consumer task,
/// mirroring the teacher's `DatabaseConnection` sharing pattern.
#[derive(Clone)]
pub struct Store {
    db: Arc<DatabaseConnection>,
}

/// Input to `CreateCampaign`: one already-validated recipient row. Produced
/// either directly by a caller or by `commands::recipients::parse_rows`.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub variables: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CreateCampaignCmd {
    pub user_id: i32,
    pub name: String,
    pub template_id: i32,
    pub smtp_account_ids: Vec<i32>,
    pub recipients: Vec<NewRecipient>,
    pub scheduled_at: Option<chrono::DateTime<Utc>>,
    pub settings: CampaignSettings,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Creates the campaign, its SmtpAccount associations, and every unique
    /// recipient in a single transaction. `totalRecipients` reflects only
    /// the rows actually inserted after de-duplication by lowercased email.
    pub async fn create_campaign(&self, cmd: CreateCampaignCmd) -> Result<campaign::Model, EngineError> {
        if cmd.smtp_account_ids.is_empty() {
            return Err(EngineError::Validation("campaign requires at least one smtp account".into()));
        }

        let txn = self.db.begin().await?;

        let tpl = template::Entity::find_by_id(cmd.template_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::Validation("template not found".into()))?;
        if tpl.user_id != cmd.user_id {
            return Err(EngineError::Validation("template not owned by user".into()));
        }
        if !tpl.active {
            return Err(EngineError::Validation("template is not active".into()));
        }

        for account_id in &cmd.smtp_account_ids {
            let account = smtp_account::Entity::find_by_id(*account_id)
                .one(&txn)
                .await?
                .ok_or_else(|| EngineError::Validation(format!("smtp account {account_id} not found")))?;
            if account.user_id != cmd.user_id {
                return Err(EngineError::Validation("smtp account not owned by user".into()));
            }
            if !account.active {
                return Err(EngineError::Validation(format!("smtp account {account_id} is not active")));
            }
        }

        let status = if cmd.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let camp = campaign::ActiveModel {
            user_id: Set(cmd.user_id),
            name: Set(cmd.name),
            template_id: Set(cmd.template_id),
            status: Set(status),
            scheduled_at: Set(cmd.scheduled_at.map(Into::into)),
            settings: Set(cmd.settings.to_json()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for account_id in &cmd.smtp_account_ids {
            campaign_smtp_account::ActiveModel {
                campaign_id: Set(camp.id),
                smtp_account_id: Set(*account_id),
            }
            .insert(&txn)
            .await?;
        }

        let mut seen = std::collections::HashSet::new();
        let mut inserted = 0i32;
        for recipient in cmd.recipients {
            let normalized = recipient.email.to_lowercase();
            if !seen.insert(normalized.clone()) {
                continue;
            }

            campaign_recipient::ActiveModel {
                campaign_id: Set(camp.id),
                email: Set(normalized),
                first_name: Set(recipient.first_name),
                last_name: Set(recipient.last_name),
                variables: Set(recipient.variables),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            inserted += 1;
        }

        let mut active: campaign::ActiveModel = camp.into();
        active.total_recipients = Set(inserted);
        let camp = active.update(&txn).await?;

        txn.commit().await?;
        Ok(camp)
    }

    /// Compare-and-set status transition: only succeeds if the campaign's
    /// current status is one of `from`. `extra_mutation` lets callers set
    /// fields like `started_at`/`completed_at` atomically with the status
    /// change.
    pub async fn transition_campaign(
        &self,
        campaign_id: i32,
        from: &[CampaignStatus],
        to: CampaignStatus,
        extra_mutation: impl FnOnce(&mut campaign::ActiveModel),
    ) -> Result<campaign::Model, EngineError> {
        let txn = self.db.begin().await?;

        let camp = campaign::Entity::find_by_id(campaign_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {campaign_id} not found")))?;

        if !from.contains(&camp.status) {
            return Err(EngineError::Precondition(format!(
                "campaign {campaign_id} is {:?}, expected one of {:?}",
                camp.status, from
            )));
        }

        let mut active: campaign::ActiveModel = camp.into();
        active.status = Set(to);
        extra_mutation(&mut active);
        let camp = active.update(&txn).await?;

        txn.commit().await?;
        Ok(camp)
    }

    pub async fn get_campaign(&self, campaign_id: i32) -> Result<campaign::Model, EngineError> {
        campaign::Entity::find_by_id(campaign_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {campaign_id} not found")))
    }

    pub async fn list_campaigns_for_user(&self, user_id: i32) -> Result<Vec<campaign::Model>, EngineError> {
        Ok(campaign::Entity::find()
            .filter(campaign::Column::UserId.eq(user_id))
            .order_by_desc(campaign::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    /// Active SmtpAccounts referenced by a campaign, in stable ascending-id
    /// order so round-robin assignment (§4.5.2 step 5) is deterministic.
    pub async fn active_smtp_accounts_for_campaign(
        &self,
        campaign_id: i32,
    ) -> Result<Vec<smtp_account::Model>, EngineError> {
        let camp = self.get_campaign(campaign_id).await?;
        let accounts = camp
            .find_related(smtp_account::Entity)
            .filter(smtp_account::Column::Active.eq(true))
            .order_by_asc(smtp_account::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(accounts)
    }

    pub async fn get_template(&self, template_id: i32) -> Result<template::Model, EngineError> {
        template::Entity::find_by_id(template_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("template {template_id} not found")))
    }

    pub async fn get_smtp_account(&self, smtp_account_id: i32) -> Result<smtp_account::Model, EngineError> {
        smtp_account::Entity::find_by_id(smtp_account_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("smtp account {smtp_account_id} not found")))
    }

    pub async fn get_user(&self, user_id: i32) -> Result<user::Model, EngineError> {
        user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id} not found")))
    }

    /// Campaigns in SCHEDULED status whose `scheduled_at` has elapsed,
    /// candidates for the calendar sweep (§4.5.3).
    pub async fn due_scheduled_campaigns(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<campaign::Model>, EngineError> {
        Ok(campaign::Entity::find()
            .filter(campaign::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(campaign::Column::ScheduledAt.lte(now))
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn get_email_log(&self, email_log_id: i32) -> Result<email_log::Model, EngineError> {
        email_log::Entity::find_by_id(email_log_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::StaleJob(format!("email log {email_log_id} no longer exists")))
    }

    pub async fn get_recipient(&self, recipient_id: i32) -> Result<campaign_recipient::Model, EngineError> {
        campaign_recipient::Entity::find_by_id(recipient_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("recipient {recipient_id} not found")))
    }

    /// Writes the subject line the Sender rendered just before it attempted
    /// delivery (§4.6 step 6), so the EmailLog's snapshot reflects what was
    /// actually sent even if the attempt later fails.
    pub async fn set_email_log_subject(&self, email_log_id: i32, subject: String) -> Result<(), EngineError> {
        let log = self.get_email_log(email_log_id).await?;
        let mut active: email_log::ActiveModel = log.into();
        active.subject_snapshot = Set(subject);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn touch_smtp_account_last_used(&self, smtp_account_id: i32) -> Result<(), EngineError> {
        let account = self.get_smtp_account(smtp_account_id).await?;
        let mut active: smtp_account::ActiveModel = account.into();
        active.last_used_at = Set(Some(Utc::now()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
