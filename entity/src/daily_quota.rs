use chrono::NaiveDate;
use sea_orm::entity::prelude::*;

/// Atomic per-(account, UTC date) counter of successful sends. Deleted
/// cascading with its owning `SmtpAccount`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_quota")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub smtp_account_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: NaiveDate,
    pub sent_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::smtp_account::Entity",
        from = "Column::SmtpAccountId",
        to = "super::smtp_account::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    SmtpAccount,
}

impl Related<super::smtp_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SmtpAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
