use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Typed view over `Campaign.settings`, the per-campaign pacing overrides.
/// Any field left unset at creation falls back to the engine-wide config
/// default at schedule time, resolved by [`CampaignSettings::resolved`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSettings {
    pub delay_between_emails: Option<DelayRange>,
    pub batch_size: Option<BatchSizeRange>,
    pub batch_delay: Option<u32>,
    pub max_retries_per_email: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchSizeRange {
    pub min: u32,
    pub max: u32,
}

/// Pacing parameters with all defaults resolved, ready for the scheduler's
/// tick algorithm (§4.5.2).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSettings {
    pub batch_size_min: u32,
    pub batch_size_max: u32,
    pub batch_delay_sec: u32,
    pub max_retries_per_email: u32,
}

impl CampaignSettings {
    pub fn from_json(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn resolved(&self, defaults: &EngineConfig) -> ResolvedSettings {
        let batch = self.batch_size.unwrap_or(BatchSizeRange {
            min: defaults.batch_size_min,
            max: defaults.batch_size_max,
        });

        ResolvedSettings {
            batch_size_min: batch.min,
            batch_size_max: batch.max,
            batch_delay_sec: self.batch_delay.unwrap_or(defaults.batch_break_duration_sec),
            max_retries_per_email: self.max_retries_per_email.unwrap_or(defaults.max_retries_per_email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_round_trip_through_json() {
        let settings = CampaignSettings::default();
        let json = settings.to_json();
        let back = CampaignSettings::from_json(&json);
        assert!(back.batch_size.is_none());
    }

    #[test]
    fn malformed_json_falls_back_to_default_rather_than_erroring() {
        let settings = CampaignSettings::from_json(&serde_json::json!({"garbage": true}));
        assert!(settings.delay_between_emails.is_none());
    }
}
