//! Join table: the non-empty set of `SmtpAccount`s a campaign may send
//! through (§3 Campaign.smtpAccountRefs).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "campaign_smtp_account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub campaign_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub smtp_account_id: i32,
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
        on_delete = "Cascade"
    )]
    SmtpAccount,
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

impl ActiveModelBehavior for ActiveModel {}
