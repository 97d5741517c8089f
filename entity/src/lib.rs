pub mod campaign;
pub mod campaign_recipient;
pub mod campaign_smtp_account;
pub mod daily_quota;
pub mod email_log;
pub mod enums;
pub mod smtp_account;
pub mod template;
pub mod user;
