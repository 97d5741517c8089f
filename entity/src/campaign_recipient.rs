use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::JsonValue;
use serde::Serialize;

use crate::enums::RecipientStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "campaign_recipient")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub campaign_id: i32,
    /// Lowercased at ingest; unique within `campaign_id`.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Opaque per-recipient key/value map (the unmapped ingest columns),
    /// stored as a JSON object of string -> string.
    pub variables: JsonValue,
    pub status: RecipientStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub smtp_account_id: Option<i32>,
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
        belongs_to = "super::smtp_account::Entity",
        from = "Column::SmtpAccountId",
        to = "super::smtp_account::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    SmtpAccount,
    #[sea_orm(has_many = "super::email_log::Entity")]
    EmailLog,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::smtp_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmtpAccount.def()
    }
}

impl Related<super::email_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
