use chrono::Utc;
use entity::smtp_account;

use crate::config::EngineConfig;
use crate::crypto::Crypto;
use crate::error::EngineError;
use crate::pool::SmtpPool;
use crate::store::{NewSmtpAccount, Store};

#[derive(Debug, Clone)]
pub struct CreateSmtpAccountCmd {
    pub user_id: i32,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub secure: bool,
    pub username: String,
    pub plaintext_password: String,
    pub from_name: String,
    pub from_email: String,
    pub daily_limit: Option<i32>,
    pub min_delay_sec: Option<u32>,
    pub max_delay_sec: Option<u32>,
}

/// An unsaved, id-less `smtp_account::Model` built purely to hand to
/// `SmtpPool::probe`, which only reads connection fields. Never persisted.
fn transient_model(cmd: &CreateSmtpAccountCmd, encrypted_password: &str) -> smtp_account::Model {
    smtp_account::Model {
        id: 0,
        created_at: Utc::now(),
        user_id: cmd.user_id,
        name: cmd.name.clone(),
        host: cmd.host.clone(),
        port: cmd.port,
        secure: cmd.secure,
        username: cmd.username.clone(),
        encrypted_password: encrypted_password.to_string(),
        from_name: cmd.from_name.clone(),
        from_email: cmd.from_email.clone(),
        daily_limit: 0,
        min_delay_sec: 0,
        max_delay_sec: 0,
        active: true,
        last_used_at: None,
    }
}

/// `CreateSmtpAccount` (§6): verifies the transport connects *before*
/// persisting anything, then stores only the encrypted password.
pub async fn create_smtp_account(
    store: &Store,
    crypto: &Crypto,
    pool: &SmtpPool,
    config: &EngineConfig,
    cmd: CreateSmtpAccountCmd,
) -> Result<smtp_account::Model, EngineError> {
    if !email_address::EmailAddress::is_valid(&cmd.from_email) {
        return Err(EngineError::Validation(format!("{} is not a syntactically valid email address", cmd.from_email)));
    }

    let probe_model = transient_model(&cmd, "");
    pool.probe(&probe_model, &cmd.plaintext_password)
        .await
        .map_err(|e| EngineError::Validation(format!("smtp account did not connect: {e}")))?;

    let encrypted_password = crypto.encrypt(&cmd.plaintext_password)?;

    store
        .create_smtp_account(NewSmtpAccount {
            user_id: cmd.user_id,
            name: cmd.name,
            host: cmd.host,
            port: cmd.port,
            secure: cmd.secure,
            username: cmd.username,
            encrypted_password,
            from_name: cmd.from_name,
            from_email: cmd.from_email,
            daily_limit: cmd.daily_limit.unwrap_or(config.default_daily_limit),
            min_delay_sec: cmd.min_delay_sec.unwrap_or(config.min_delay_between_emails) as i32,
            max_delay_sec: cmd.max_delay_sec.unwrap_or(config.max_delay_between_emails) as i32,
        })
        .await
}

/// `TestSmtpAccount` (§6): attempts a connection against the already
/// persisted account, bumping `lastUsed` on success.
pub async fn test_smtp_account(
    store: &Store,
    crypto: &Crypto,
    pool: &SmtpPool,
    smtp_account_id: i32,
) -> Result<(), EngineError> {
    let account = store.get_smtp_account(smtp_account_id).await?;
    let password = crypto.decrypt(&account.encrypted_password)?;

    pool.probe(&account, &password)
        .await
        .map_err(|e| EngineError::Validation(format!("smtp account did not connect: {e}")))?;

    store.touch_smtp_account_last_used(smtp_account_id).await
}

/// `ToggleSmtpAccount` (§6): flips the active flag.
pub async fn toggle_smtp_account(store: &Store, smtp_account_id: i32) -> Result<smtp_account::Model, EngineError> {
    store.toggle_smtp_account(smtp_account_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cmd() -> CreateSmtpAccountCmd {
        CreateSmtpAccountCmd {
            user_id: 1,
            name: "Primary".into(),
            host: "smtp.example.com".into(),
            port: 587,
            secure: true,
            username: "user".into(),
            plaintext_password: "hunter2".into(),
            from_name: "Sender".into(),
            from_email: "sender@example.com".into(),
            daily_limit: Some(250),
            min_delay_sec: Some(12),
            max_delay_sec: Some(20),
        }
    }

    #[test]
    fn transient_model_never_carries_a_real_id() {
        let model = transient_model(&base_cmd(), "ciphertext");
        assert_eq!(model.id, 0);
        assert_eq!(model.encrypted_password, "ciphertext");
    }
}
