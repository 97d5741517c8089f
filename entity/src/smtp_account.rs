use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "smtp_account")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub user_id: i32,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub secure: bool,
    pub username: String,
    /// AES-GCM ciphertext produced by `engine::crypto`, never the plaintext.
    #[serde(skip_serializing)]
    pub encrypted_password: String,
    pub from_name: String,
    pub from_email: String,
    pub daily_limit: i32,
    pub min_delay_sec: i32,
    pub max_delay_sec: i32,
    pub active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
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
    #[sea_orm(has_many = "super::daily_quota::Entity")]
    DailyQuota,
    #[sea_orm(has_many = "super::email_log::Entity")]
    EmailLog,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::daily_quota::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailyQuota.def()
    }
}

impl Related<super::email_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
