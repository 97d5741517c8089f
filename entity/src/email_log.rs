use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::enums::EmailLogStatus;

/// The authoritative per-attempt record and the idempotency key for
/// delivery: exactly one row represents the current attempt for a recipient.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "email_log")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub campaign_id: i32,
    pub recipient_id: i32,
    pub smtp_account_id: i32,
    pub status: EmailLogStatus,
    pub subject_snapshot: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub message_id: Option<String>,
    pub bounce_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Campaign,
    #[sea_orm(
        belongs_to = "super::campaign_recipient::Entity",
        from = "Column::RecipientId",
        to = "super::campaign_recipient::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    CampaignRecipient,
    #[sea_orm(
        belongs_to = "super::smtp_account::Entity",
        from = "Column::SmtpAccountId",
        to = "super::smtp_account::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    SmtpAccount,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::campaign_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignRecipient.def()
    }
}

impl Related<super::smtp_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmtpAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn before_save<'life0, 'async_trait, C>(
        mut self,
        _db: &'life0 C,
        insert: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self, DbErr>> + Send + 'async_trait>>
    where
        Self: 'async_trait,
        C: sea_orm::ConnectionTrait + 'life0,
        'life0: 'async_trait,
    {
        Box::pin(async move {
            if !insert {
                self.updated_at = sea_orm::Set(Utc::now());
            }
            Ok(self)
        })
    }
}
