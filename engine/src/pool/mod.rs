use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use entity::smtp_account;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use mail_send::mail_builder::MessageBuilder;
use mail_send::SmtpClientBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};

use crate::config::EngineConfig;
use crate::crypto::Crypto;
use crate::error::EngineError;

/// A fully rendered message ready for the wire. Built by the Sender from a
/// `Renderer` output and a claimed recipient/SmtpAccount pair.
pub struct OutboundEmail<'a> {
    pub from_name: &'a str,
    pub from_email: &'a str,
    pub to_email: &'a str,
    pub subject: &'a str,
    pub html_body: &'a str,
}

/// Abstracts over whichever concrete stream type `mail-send` negotiated
/// (plain, STARTTLS-upgraded, or implicit TLS), so the pool can hold one
/// uniform transport type regardless of how a given account connects.
#[async_trait]
pub trait MailTransport: Send {
    async fn deliver(&mut self, message: MessageBuilder<'_>) -> Result<(), mail_send::Error>;
}

#[async_trait]
impl<S> MailTransport for mail_send::SmtpClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn deliver(&mut self, message: MessageBuilder<'_>) -> Result<(), mail_send::Error> {
        self.send(message).await
    }
}

struct PooledTransport {
    transport: Box<dyn MailTransport>,
    messages_sent: u32,
    idle_since: Instant,
}

/// A live, in-use transport checked out from the pool. Dropping it without
/// calling [`SmtpPool::release`] is a connection leak from the pool's point
/// of view (it simply never comes back) but never double-frees the
/// concurrency permit, since the permit is held by this guard.
pub struct Lease {
    smtp_account_id: i32,
    transport: PooledTransport,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    pub async fn send(&mut self, message: MessageBuilder<'_>) -> Result<(), mail_send::Error> {
        self.transport.transport.deliver(message).await?;
        self.transport.messages_sent += 1;
        Ok(())
    }
}

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct AccountPool {
    semaphore: Arc<Semaphore>,
    max_connections: usize,
    limiter: Arc<Limiter>,
    idle: Mutex<Vec<PooledTransport>>,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
    opened: Mutex<u64>,
    closed: Mutex<u64>,
}

/// §4.4 `Metrics()`: total opened/closed, current live, checked-out,
/// pool hit/miss counts and hit rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    pub hits: u64,
    pub misses: u64,
    pub idle_transports: usize,
    pub available_permits: usize,
    pub total_opened: u64,
    pub total_closed: u64,
    pub current_live: u64,
    pub active: usize,
    pub hit_rate: f64,
}

/// Keyed pool of live SMTP transports: one logical pool per SmtpAccount,
/// with idle reaping, a per-account concurrency ceiling, and a per-account
/// message rate limit enforced by `governor`.
pub struct SmtpPool {
    config: &'static EngineConfig,
    crypto: Arc<Crypto>,
    pools: RwLock<HashMap<i32, Arc<AccountPool>>>,
}

impl SmtpPool {
    pub fn new(config: &'static EngineConfig, crypto: Arc<Crypto>) -> Self {
        Self {
            config,
            crypto,
            pools: RwLock::new(HashMap::new()),
        }
    }

    async fn account_pool(&self, smtp_account_id: i32) -> Arc<AccountPool> {
        if let Some(pool) = self.pools.read().await.get(&smtp_account_id) {
            return pool.clone();
        }

        let mut pools = self.pools.write().await;
        pools
            .entry(smtp_account_id)
            .or_insert_with(|| {
                let quota = Quota::per_second(
                    NonZeroU32::new(self.config.smtp_pool_rate_limit_per_sec.max(1)).unwrap(),
                );
                Arc::new(AccountPool {
                    semaphore: Arc::new(Semaphore::new(self.config.smtp_pool_max_connections as usize)),
                    max_connections: self.config.smtp_pool_max_connections as usize,
                    limiter: Arc::new(RateLimiter::direct(quota)),
                    idle: Mutex::new(Vec::new()),
                    hits: Mutex::new(0),
                    misses: Mutex::new(0),
                    opened: Mutex::new(0),
                    closed: Mutex::new(0),
                })
            })
            .clone()
    }

    /// Returns a leased transport for `account`, opening a fresh connection
    /// if the idle pool is empty. Blocks (respecting the per-account
    /// concurrency ceiling) until a permit and, separately, the rate
    /// limiter's next slot are available.
    pub async fn acquire(&self, account: &smtp_account::Model) -> Result<Lease, EngineError> {
        let pool = self.account_pool(account.id).await;

        let permit = pool
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Internal("smtp pool semaphore closed".into()))?;

        pool.limiter.until_ready().await;

        let reusable = {
            let mut idle = pool.idle.lock().await;
            idle.pop()
        };

        let transport = match reusable {
            Some(t) if t.messages_sent < self.config.smtp_pool_max_messages => {
                *pool.hits.lock().await += 1;
                t
            }
            stale => {
                if stale.is_some() {
                    *pool.closed.lock().await += 1;
                }
                *pool.misses.lock().await += 1;
                let password = self.crypto.decrypt(&account.encrypted_password)?;
                let transport = self.connect(account, &password).await?;
                *pool.opened.lock().await += 1;
                PooledTransport {
                    transport,
                    messages_sent: 0,
                    idle_since: Instant::now(),
                }
            }
        };

        Ok(Lease {
            smtp_account_id: account.id,
            transport,
            _permit: permit,
        })
    }

    /// Returns a transport to the idle pool, marking it available for
    /// reuse. Transports that hit `maxMessages` are dropped instead of
    /// recycled.
    pub async fn release(&self, lease: Lease) {
        let pool = self.account_pool(lease.smtp_account_id).await;
        if lease.transport.messages_sent >= self.config.smtp_pool_max_messages {
            *pool.closed.lock().await += 1;
            return;
        }
        let mut transport = lease.transport;
        transport.idle_since = Instant::now();
        pool.idle.lock().await.push(transport);
    }

    /// Drops idle transports that have sat unused longer than
    /// `idleTimeout`. Intended to run on a background ticker, not per-send.
    pub async fn reap_idle(&self) {
        let idle_timeout = self.config.idle_timeout();
        let pools = self.pools.read().await;
        for pool in pools.values() {
            let mut idle = pool.idle.lock().await;
            let before = idle.len();
            idle.retain(|t| t.idle_since.elapsed() < idle_timeout);
            let reaped = (before - idle.len()) as u64;
            if reaped > 0 {
                *pool.closed.lock().await += reaped;
            }
        }
    }

    pub async fn metrics(&self, smtp_account_id: i32) -> PoolMetrics {
        let pool = self.account_pool(smtp_account_id).await;
        let hits = *pool.hits.lock().await;
        let misses = *pool.misses.lock().await;
        let total_opened = *pool.opened.lock().await;
        let total_closed = *pool.closed.lock().await;
        let attempts = hits + misses;
        PoolMetrics {
            hits,
            misses,
            idle_transports: pool.idle.lock().await.len(),
            available_permits: pool.semaphore.available_permits(),
            total_opened,
            total_closed,
            current_live: total_opened.saturating_sub(total_closed),
            active: pool.max_connections.saturating_sub(pool.semaphore.available_permits()),
            hit_rate: if attempts == 0 { 0.0 } else { hits as f64 / attempts as f64 },
        }
    }

    /// Attempts a connection without sending anything, used by
    /// `CreateSmtpAccount` (verify before persisting) and `TestSmtpAccount`.
    pub async fn probe(&self, account: &smtp_account::Model, plaintext_password: &str) -> Result<(), EngineError> {
        self.connect(account, plaintext_password).await?;
        Ok(())
    }

    async fn connect(
        &self,
        account: &smtp_account::Model,
        password: &str,
    ) -> Result<Box<dyn MailTransport>, EngineError> {
        let client = SmtpClientBuilder::new(account.host.clone(), account.port as u16)
            .implicit_tls(account.secure)
            .credentials((account.username.as_str(), password))
            .connect()
            .await
            .map_err(|e| EngineError::TransportSoft(format!("smtp connect failed: {e}")))?;

        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_metrics_default_to_zero() {
        let metrics = PoolMetrics::default();
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.misses, 0);
    }
}
