use entity::smtp_account;
use rand::Rng;

use crate::store::batch::ClaimedRecipient;
use crate::store::settings::ResolvedSettings;

/// One recipient's computed placement within a tick's dispatch plan: how
/// long after the tick fires its `email-send` job should run, and which
/// SmtpAccount will carry it.
#[derive(Debug, Clone)]
pub struct PlannedSend {
    pub recipient_id: i32,
    pub delay_secs: u64,
    pub smtp_account_id: i32,
}

fn rand_range(rng: &mut impl Rng, min: u32, max: u32) -> u32 {
    if min >= max {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

/// Implements §4.5.2 steps 4-5: per-recipient randomized delay drawn from
/// the *assigned* SmtpAccount's min/max window, randomized batch sizing
/// with an inter-batch break, and deterministic round-robin account
/// assignment keyed by the claim sequence number so the same claimed batch
/// always maps to the same accounts across tick retries.
pub fn plan_batch(
    claimed: &[ClaimedRecipient],
    accounts: &[smtp_account::Model],
    settings: ResolvedSettings,
    rng: &mut impl Rng,
) -> Vec<PlannedSend> {
    assert!(!accounts.is_empty(), "plan_batch requires at least one active smtp account");

    let mut plans = Vec::with_capacity(claimed.len());
    let mut cum_delay: u64 = 0;
    let mut in_batch: u32 = 0;
    let mut batch_size = rand_range(rng, settings.batch_size_min, settings.batch_size_max).max(1);

    for (i, item) in claimed.iter().enumerate() {
        let is_last = i == claimed.len() - 1;
        let account = &accounts[(item.sequence as usize) % accounts.len()];

        if in_batch == batch_size && !is_last {
            cum_delay += settings.batch_delay_sec as u64;
            in_batch = 0;
            batch_size = rand_range(rng, settings.batch_size_min, settings.batch_size_max).max(1);
        } else {
            let d_email = rand_range(rng, account.min_delay_sec as u32, account.max_delay_sec as u32);
            cum_delay += d_email as u64;
            in_batch += 1;
        }

        plans.push(PlannedSend {
            recipient_id: item.recipient.id,
            delay_secs: cum_delay,
            smtp_account_id: account.id,
        });
    }

    plans
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use entity::enums::RecipientStatus;
    use entity::campaign_recipient;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn account(id: i32, min: i32, max: i32) -> smtp_account::Model {
        smtp_account::Model {
            id,
            created_at: Utc::now(),
            user_id: 1,
            name: "a".into(),
            host: "smtp.example.com".into(),
            port: 587,
            secure: true,
            username: "u".into(),
            encrypted_password: "x".into(),
            from_name: "From".into(),
            from_email: "from@example.com".into(),
            daily_limit: 100,
            min_delay_sec: min,
            max_delay_sec: max,
            active: true,
            last_used_at: None,
        }
    }

    fn claimed(n: usize) -> Vec<ClaimedRecipient> {
        (0..n)
            .map(|i| ClaimedRecipient {
                sequence: i as u64,
                recipient: campaign_recipient::Model {
                    id: i as i32 + 1,
                    created_at: Utc::now(),
                    campaign_id: 1,
                    email: format!("r{i}@x.com"),
                    first_name: None,
                    last_name: None,
                    variables: serde_json::json!({}),
                    status: RecipientStatus::Queued,
                    sent_at: None,
                    failed_reason: None,
                    smtp_account_id: None,
                },
            })
            .collect()
    }

    #[test]
    fn fixed_delay_and_fixed_batch_gives_s1_scenario_spacing() {
        let accounts = vec![account(1, 15, 15)];
        let settings = ResolvedSettings {
            batch_size_min: 10,
            batch_size_max: 10,
            batch_delay_sec: 120,
            max_retries_per_email: 3,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let plans = plan_batch(&claimed(2), &accounts, settings, &mut rng);
        assert_eq!(plans[0].delay_secs, 15);
        assert_eq!(plans[1].delay_secs, 30);
    }

    #[test]
    fn round_robins_across_accounts_by_claim_sequence() {
        let accounts = vec![account(1, 1, 1), account(2, 1, 1)];
        let settings = ResolvedSettings {
            batch_size_min: 100,
            batch_size_max: 100,
            batch_delay_sec: 120,
            max_retries_per_email: 3,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let plans = plan_batch(&claimed(4), &accounts, settings, &mut rng);
        assert_eq!(plans[0].smtp_account_id, 1);
        assert_eq!(plans[1].smtp_account_id, 2);
        assert_eq!(plans[2].smtp_account_id, 1);
        assert_eq!(plans[3].smtp_account_id, 2);
    }

    #[test]
    fn inserts_batch_break_after_batch_size_messages() {
        let accounts = vec![account(1, 5, 5)];
        let settings = ResolvedSettings {
            batch_size_min: 2,
            batch_size_max: 2,
            batch_delay_sec: 100,
            max_retries_per_email: 3,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let plans = plan_batch(&claimed(3), &accounts, settings, &mut rng);
        // recipient 0: +5 => 5; recipient 1: +5 => 10 (in_batch now 2 == B);
        // recipient 2: break triggers => +100 => 110
        assert_eq!(plans[0].delay_secs, 5);
        assert_eq!(plans[1].delay_secs, 10);
        assert_eq!(plans[2].delay_secs, 110);
    }
}
