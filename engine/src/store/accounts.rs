use entity::{smtp_account, template, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};

use crate::error::EngineError;

use super::Store;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSmtpAccount {
    pub user_id: i32,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub secure: bool,
    pub username: String,
    /// Already encrypted by `crypto::Crypto::encrypt`; the Store never
    /// sees a plaintext password.
    pub encrypted_password: String,
    pub from_name: String,
    pub from_email: String,
    pub daily_limit: i32,
    pub min_delay_sec: i32,
    pub max_delay_sec: i32,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub user_id: i32,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub variables: Vec<String>,
}

impl Store {
    /// Creates a User row. Password hashing and auth-token issuance are the
    /// HTTP layer's concern (§1 Non-goals); this only persists the already
    /// hashed credential. A duplicate email surfaces as `Validation` rather
    /// than the raw unique-constraint error.
    pub async fn create_user(&self, new_user: NewUser) -> Result<user::Model, EngineError> {
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(new_user.email.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(EngineError::Validation(format!("email {} already registered", new_user.email)));
        }

        let created = user::ActiveModel {
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            active: Set(true),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        Ok(created)
    }

    /// Persists an SmtpAccount. Callers must have already verified
    /// connectivity (`SmtpPool::probe`) before calling this, per the
    /// `CreateSmtpAccount` command contract.
    pub async fn create_smtp_account(&self, new_account: NewSmtpAccount) -> Result<smtp_account::Model, EngineError> {
        if new_account.min_delay_sec < 10 || new_account.max_delay_sec < 10 {
            return Err(EngineError::Validation("min/max delay must each be at least 10 seconds".into()));
        }
        if new_account.min_delay_sec > new_account.max_delay_sec {
            return Err(EngineError::Validation("min delay must not exceed max delay".into()));
        }
        if new_account.daily_limit <= 0 {
            return Err(EngineError::Validation("daily limit must be greater than zero".into()));
        }

        let created = smtp_account::ActiveModel {
            user_id: Set(new_account.user_id),
            name: Set(new_account.name),
            host: Set(new_account.host),
            port: Set(new_account.port),
            secure: Set(new_account.secure),
            username: Set(new_account.username),
            encrypted_password: Set(new_account.encrypted_password),
            from_name: Set(new_account.from_name),
            from_email: Set(new_account.from_email),
            daily_limit: Set(new_account.daily_limit),
            min_delay_sec: Set(new_account.min_delay_sec),
            max_delay_sec: Set(new_account.max_delay_sec),
            active: Set(true),
            last_used_at: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        Ok(created)
    }

    pub async fn toggle_smtp_account(&self, smtp_account_id: i32) -> Result<smtp_account::Model, EngineError> {
        let account = self.get_smtp_account(smtp_account_id).await?;
        let flipped = !account.active;
        let mut active: smtp_account::ActiveModel = account.into();
        active.active = Set(flipped);
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Deletion is forbidden while the account is referenced by any
    /// non-terminal campaign (§3 invariant).
    pub async fn delete_smtp_account(&self, smtp_account_id: i32) -> Result<(), EngineError> {
        use entity::campaign;
        use entity::campaign_smtp_account;
        use entity::enums::CampaignStatus;

        let referencing = campaign_smtp_account::Entity::find()
            .filter(campaign_smtp_account::Column::SmtpAccountId.eq(smtp_account_id))
            .find_also_related(campaign::Entity)
            .all(self.db.as_ref())
            .await?;

        let blocked = referencing
            .iter()
            .any(|(_, camp)| camp.as_ref().map(|c| !c.status.is_terminal()).unwrap_or(false));

        if blocked {
            return Err(EngineError::Precondition(
                "smtp account is referenced by a non-terminal campaign".into(),
            ));
        }

        let account = self.get_smtp_account(smtp_account_id).await?;
        account.delete(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn list_smtp_accounts_for_user(&self, user_id: i32) -> Result<Vec<smtp_account::Model>, EngineError> {
        Ok(smtp_account::Entity::find()
            .filter(smtp_account::Column::UserId.eq(user_id))
            .order_by_asc(smtp_account::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    /// `Template.variables` is recomputed from `subject`/`body` by the
    /// caller (`renderer::extract_variables`) before this is invoked; the
    /// Store just persists the result, it never parses templates itself.
    pub async fn create_template(&self, new_template: NewTemplate) -> Result<template::Model, EngineError> {
        let created = template::ActiveModel {
            user_id: Set(new_template.user_id),
            name: Set(new_template.name),
            subject: Set(new_template.subject),
            body: Set(new_template.body),
            variables: Set(new_template.variables),
            active: Set(true),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        Ok(created)
    }

    pub async fn list_templates_for_user(&self, user_id: i32) -> Result<Vec<template::Model>, EngineError> {
        Ok(template::Entity::find()
            .filter(template::Column::UserId.eq(user_id))
            .order_by_asc(template::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    // Exercised against a real connection by the command-layer tests in
    // `commands::smtp_accounts`/`commands::templates`, which use the
    // in-memory fakes rather than re-asserting query shapes here.
}
