use std::sync::Arc;
use std::time::Duration;

use engine::queue::{ack, nack, CampaignTickJob, EmailSendJob, JobQueue};
use engine::{config::EngineConfig, pool::SmtpPool, scheduler, sender, store::Store};
use futures::StreamExt;

use crate::shutdown::Shutdown;

/// Runs the `campaign-tick` consumer until shutdown is requested. Ticks are
/// cheap and idempotent (`handle_tick` re-checks campaign status itself), so
/// failures are nacked with requeue rather than dropped.
pub async fn run_tick_consumer(store: Store, queue: Arc<JobQueue>, config: &'static EngineConfig, shutdown: Arc<Shutdown>) {
    let mut consumer = match queue.consume_ticks("worker-tick").await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to start campaign-tick consumer");
            return;
        }
    };

    while !shutdown.requested() {
        let delivery = tokio::select! {
            next = consumer.next() => next,
            _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
        };

        let Some(delivery) = delivery else { break };
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "campaign-tick consumer stream error");
                continue;
            }
        };

        shutdown.enter();
        let store = store.clone();
        let queue = queue.clone();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let job: Option<CampaignTickJob> = serde_json::from_slice(&delivery.data).ok();
                match job {
                    Some(job) => match scheduler::handle_tick(&store, &queue, config, job.campaign_id).await {
                        Ok(()) => {
                            let _ = ack(&delivery).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, campaign_id = job.campaign_id, "tick handling failed, requeueing");
                            let _ = nack(&delivery, true).await;
                        }
                    },
                    None => {
                        tracing::error!("unparseable campaign-tick payload, dropping");
                        let _ = nack(&delivery, false).await;
                    }
                }
                shutdown.exit();
            }
        });
    }

    tracing::info!("campaign-tick consumer stopped pulling new deliveries");
}

/// Runs the `email-send` consumer until shutdown is requested. `handle_send`
/// already turns every per-attempt outcome into a terminal EmailLog state or
/// a self-requeue with a fresh delay, so an `Err` here means a genuinely
/// transient failure (Store/queue unavailable) worth redelivering.
pub async fn run_send_consumer(
    store: Store,
    queue: Arc<JobQueue>,
    pool: Arc<SmtpPool>,
    config: &'static EngineConfig,
    shutdown: Arc<Shutdown>,
) {
    let mut consumer = match queue.consume_sends("worker-send").await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to start email-send consumer");
            return;
        }
    };

    while !shutdown.requested() {
        let delivery = tokio::select! {
            next = consumer.next() => next,
            _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
        };

        let Some(delivery) = delivery else { break };
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "email-send consumer stream error");
                continue;
            }
        };

        shutdown.enter();
        let store = store.clone();
        let queue = queue.clone();
        let pool = pool.clone();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let job: Option<EmailSendJob> = serde_json::from_slice(&delivery.data).ok();
                match job {
                    Some(job) => match sender::handle_send(&store, &queue, &pool, config, job.email_log_id, job.attempt).await {
                        Ok(()) => {
                            let _ = ack(&delivery).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, email_log_id = job.email_log_id, "send handling failed, requeueing");
                            let _ = nack(&delivery, true).await;
                        }
                    },
                    None => {
                        tracing::error!("unparseable email-send payload, dropping");
                        let _ = nack(&delivery, false).await;
                    }
                }
                shutdown.exit();
            }
        });
    }

    tracing::info!("email-send consumer stopped pulling new deliveries");
}

/// Periodic background jobs that don't ride the broker: the §4.5.3 calendar
/// sweep and idle SMTP transport reaping, both on a 60s cadence.
pub async fn run_background_ticks(store: Store, queue: Arc<JobQueue>, pool: Arc<SmtpPool>, shutdown: Arc<Shutdown>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    while !shutdown.requested() {
        interval.tick().await;
        if shutdown.requested() {
            break;
        }

        if let Err(e) = scheduler::calendar_sweep(&store, &queue).await {
            tracing::error!(error = %e, "calendar sweep failed");
        }
        pool.reap_idle().await;
    }
}
