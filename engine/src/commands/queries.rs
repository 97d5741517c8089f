//! Read-only query surface (§6): listing and stats reads that accompany
//! the mutating commands. Ownership scoping (a user only ever sees their
//! own rows) is enforced here rather than in the Store, matching where the
//! campaigns/templates/accounts modules already do their own lookups.

use entity::enums::EmailLogStatus;
use entity::{campaign, smtp_account, template};

use crate::error::EngineError;
use crate::pool::{PoolMetrics, SmtpPool};
use crate::store::{EmailLogPage, Store};

pub async fn list_campaigns(store: &Store, user_id: i32) -> Result<Vec<campaign::Model>, EngineError> {
    store.list_campaigns_for_user(user_id).await
}

pub async fn get_campaign(store: &Store, user_id: i32, campaign_id: i32) -> Result<campaign::Model, EngineError> {
    let camp = store.get_campaign(campaign_id).await?;
    if camp.user_id != user_id {
        return Err(EngineError::NotFound(format!("campaign {campaign_id} not found")));
    }
    Ok(camp)
}

/// `GetCampaignStats` (§6): the counters already maintained on the row
/// itself, nothing computed ad hoc.
#[derive(Debug, Clone)]
pub struct CampaignStats {
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub bounce_count: i32,
    pub bounce_rate: f64,
}

pub async fn get_campaign_stats(store: &Store, user_id: i32, campaign_id: i32) -> Result<CampaignStats, EngineError> {
    let camp = get_campaign(store, user_id, campaign_id).await?;
    Ok(CampaignStats {
        total_recipients: camp.total_recipients,
        sent_count: camp.sent_count,
        failed_count: camp.failed_count,
        bounce_count: camp.bounce_count,
        bounce_rate: camp.bounce_rate,
    })
}

/// `GetCampaignAttemptLog` (§6): paginated, optionally filtered EmailLog
/// page for one campaign.
pub async fn get_campaign_attempt_log(
    store: &Store,
    user_id: i32,
    campaign_id: i32,
    status: Option<EmailLogStatus>,
    page: u64,
    page_size: u64,
) -> Result<EmailLogPage, EngineError> {
    get_campaign(store, user_id, campaign_id).await?;
    store.list_email_logs(campaign_id, status, page, page_size).await
}

pub async fn list_smtp_accounts(store: &Store, user_id: i32) -> Result<Vec<smtp_account::Model>, EngineError> {
    store.list_smtp_accounts_for_user(user_id).await
}

pub async fn get_smtp_account(store: &Store, user_id: i32, smtp_account_id: i32) -> Result<smtp_account::Model, EngineError> {
    let account = store.get_smtp_account(smtp_account_id).await?;
    if account.user_id != user_id {
        return Err(EngineError::NotFound(format!("smtp account {smtp_account_id} not found")));
    }
    Ok(account)
}

/// SMTP pool health for one account, surfaced alongside the account's own
/// row (connection reuse hit rate, idle transports, free concurrency
/// permits) — operational visibility into §4.4's pooling behavior.
pub async fn get_smtp_account_pool_metrics(
    store: &Store,
    pool: &SmtpPool,
    user_id: i32,
    smtp_account_id: i32,
) -> Result<PoolMetrics, EngineError> {
    get_smtp_account(store, user_id, smtp_account_id).await?;
    Ok(pool.metrics(smtp_account_id).await)
}

pub async fn list_templates(store: &Store, user_id: i32) -> Result<Vec<template::Model>, EngineError> {
    store.list_templates_for_user(user_id).await
}

pub async fn get_template(store: &Store, user_id: i32, template_id: i32) -> Result<template::Model, EngineError> {
    let tpl = store.get_template(template_id).await?;
    if tpl.user_id != user_id {
        return Err(EngineError::NotFound(format!("template {template_id} not found")));
    }
    Ok(tpl)
}
