//! Deterministic-ish local/dev seeding, grounded in the workspace's existing
//! `fake`-crate seeder convention. Not run as part of `Migrator::up`; callers
//! (dev tooling, integration test setup) invoke `seed_dev_data` explicitly.

use entity::{campaign, campaign_recipient, campaign_smtp_account, smtp_account, template, user};
use fake::{faker, Fake};
use rand::Rng;
use sea_orm_migration::sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use sea_orm_migration::DbErr;

fn fake_password_hash() -> String {
    // cost 4: seeded data is throwaway, speed over security here.
    bcrypt_stub(faker::internet::en::Password(10..20).fake::<String>())
}

/// The workspace has no bcrypt dependency in this crate; seeded accounts are
/// never authenticated against, so a fixed placeholder hash is enough.
fn bcrypt_stub(_plain: String) -> String {
    String::from("$2b$04$seedcafeseedcafeseedcafeseedcafeseedcafeseedcafeseed")
}

fn fake_email() -> String {
    faker::internet::en::FreeEmail().fake()
}

pub async fn seed_dev_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let owner = user::ActiveModel {
        email: Set(fake_email()),
        password_hash: Set(fake_password_hash()),
        first_name: Set(Some(faker::name::en::FirstName().fake())),
        last_name: Set(Some(faker::name::en::LastName().fake())),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let account = smtp_account::ActiveModel {
        user_id: Set(owner.id),
        name: Set("Primary sender".into()),
        host: Set("smtp.example.com".into()),
        port: Set(587),
        secure: Set(true),
        username: Set("seed-account".into()),
        encrypted_password: Set("seed-placeholder-ciphertext".into()),
        from_name: Set("Seed Sender".into()),
        from_email: Set("seed-sender@example.com".into()),
        daily_limit: Set(500),
        min_delay_sec: Set(10),
        max_delay_sec: Set(30),
        active: Set(true),
        last_used_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let tpl = template::ActiveModel {
        user_id: Set(owner.id),
        name: Set("Welcome".into()),
        subject: Set("Hi {{firstName}}".into()),
        body: Set("Hello {{firstName}} at {{company}}! [UNSUBSCRIBE]".into()),
        variables: Set(vec!["firstName".into(), "company".into()]),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let camp = campaign::ActiveModel {
        user_id: Set(owner.id),
        name: Set("Seed campaign".into()),
        template_id: Set(tpl.id),
        settings: Set(serde_json::json!({})),
        ..Default::default()
    }
    .insert(db)
    .await?;

    campaign_smtp_account::ActiveModel {
        campaign_id: Set(camp.id),
        smtp_account_id: Set(account.id),
    }
    .insert(db)
    .await?;

    let mut rng = rand::thread_rng();
    let recipient_count = rng.gen_range(5..15);
    for _ in 0..recipient_count {
        campaign_recipient::ActiveModel {
            campaign_id: Set(camp.id),
            email: Set(fake_email().to_lowercase()),
            first_name: Set(Some(faker::name::en::FirstName().fake())),
            last_name: Set(Some(faker::name::en::LastName().fake())),
            variables: Set(serde_json::json!({ "company": "Acme" })),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    let mut camp_active: campaign::ActiveModel = camp.into();
    camp_active.total_recipients = Set(recipient_count);
    camp_active.update(db).await?;

    Ok(())
}
