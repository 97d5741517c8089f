use std::{env, sync::OnceLock, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;

fn default_office_hours_start() -> u32 {
    8
}
fn default_office_hours_end() -> u32 {
    18
}
fn default_max_bounce_rate() -> f64 {
    5.0
}
fn default_daily_limit() -> i32 {
    500
}
fn default_min_delay() -> u32 {
    10
}
fn default_max_delay() -> u32 {
    30
}
fn default_batch_size_min() -> u32 {
    10
}
fn default_batch_size_max() -> u32 {
    20
}
fn default_batch_break() -> u32 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_pool_max_size() -> u32 {
    5
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_max_connections() -> u32 {
    3
}
fn default_max_messages() -> u32 {
    100
}
fn default_rate_limit() -> u32 {
    14
}

/// Process-wide configuration, loaded once at startup the same way the
/// workspace's mailer service loads its own: a YAML file selected by
/// `RUN_MODE` (defaulting to `development`), layered under environment
/// variables so deployments can override any key without touching the file.
#[derive(Deserialize, Debug)]
pub struct EngineConfig {
    #[serde(default)]
    pub app_debug: bool,

    pub tracer_service_name: String,

    pub database_url: String,

    pub rmq_uri: String,

    #[serde(default = "default_campaign_tick_queue")]
    pub rmq_tick_queue: String,

    #[serde(default = "default_email_send_queue")]
    pub rmq_send_queue: String,

    /// Symmetric key (32 raw bytes, base64-encoded) used by `crypto` to
    /// envelope SMTP passwords at rest.
    pub encryption_key_base64: String,

    /// 24-hour local-time window start during which sends may hit the wire.
    #[serde(default = "default_office_hours_start")]
    pub office_hours_start: u32,

    #[serde(default = "default_office_hours_end")]
    pub office_hours_end: u32,

    /// Percent threshold above which a running campaign auto-pauses.
    #[serde(default = "default_max_bounce_rate")]
    pub max_bounce_rate: f64,

    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i32,

    #[serde(default = "default_min_delay")]
    pub min_delay_between_emails: u32,

    #[serde(default = "default_max_delay")]
    pub max_delay_between_emails: u32,

    #[serde(default = "default_batch_size_min")]
    pub batch_size_min: u32,

    #[serde(default = "default_batch_size_max")]
    pub batch_size_max: u32,

    #[serde(default = "default_batch_break")]
    pub batch_break_duration_sec: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries_per_email: u32,

    #[serde(default = "default_pool_max_size")]
    pub smtp_pool_max_size: u32,

    #[serde(default = "default_idle_timeout_secs")]
    pub smtp_pool_idle_timeout_secs: u64,

    #[serde(default = "default_max_connections")]
    pub smtp_pool_max_connections: u32,

    #[serde(default = "default_max_messages")]
    pub smtp_pool_max_messages: u32,

    #[serde(default = "default_rate_limit")]
    pub smtp_pool_rate_limit_per_sec: u32,

    /// Host used to build unsubscribe links, e.g. `app.example.com`.
    pub unsubscribe_host: String,
}

fn default_campaign_tick_queue() -> String {
    "campaign-tick".into()
}

fn default_email_send_queue() -> String {
    "email-send".into()
}

impl EngineConfig {
    pub fn from_env() -> EngineConfig {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let base_path = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();

        let yaml_config_file = File::with_name(&format!("{base_path}/env/{run_mode}.yaml"))
            .format(config::FileFormat::Yaml)
            .required(false);

        Config::builder()
            .add_source(yaml_config_file)
            .add_source(Environment::default())
            .build()
            .unwrap_or_else(|error| panic!("[CFG] error loading config, {:#?}", error))
            .try_deserialize::<EngineConfig>()
            .unwrap_or_else(|error| panic!("[CFG] error deserializing config, {:#?}", error))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_pool_idle_timeout_secs)
    }
}

/// returns a global read only reference to the engine configuration
pub fn app_config() -> &'static EngineConfig {
    static INSTANCE: OnceLock<EngineConfig> = OnceLock::new();
    INSTANCE.get_or_init(EngineConfig::from_env)
}
