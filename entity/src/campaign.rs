use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::JsonValue;
use serde::Serialize;

use crate::enums::CampaignStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "campaign")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub user_id: i32,
    pub name: String,
    pub template_id: i32,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub bounce_count: i32,
    pub bounce_rate: f64,
    /// `engine::store::settings::CampaignSettings` serialized as JSON: the
    /// per-campaign pacing overrides (`delayBetweenEmails`, `batchSize`,
    /// `batchDelay`, `maxRetriesPerEmail`). Unset fields fall back to the
    /// engine-wide config defaults at schedule time.
    pub settings: JsonValue,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Template,
    #[sea_orm(has_many = "super::campaign_recipient::Entity")]
    CampaignRecipient,
    #[sea_orm(has_many = "super::email_log::Entity")]
    EmailLog,
    #[sea_orm(has_many = "super::campaign_smtp_account::Entity")]
    CampaignSmtpAccount,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::campaign_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignRecipient.def()
    }
}

impl Related<super::email_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailLog.def()
    }
}

impl Related<super::smtp_account::Entity> for Entity {
    fn to() -> RelationDef {
        super::campaign_smtp_account::Relation::SmtpAccount.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::campaign_smtp_account::Relation::Campaign.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
