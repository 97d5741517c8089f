use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        let statement = r#"
        create type "campaign_status" as enum (
            'DRAFT', 'SCHEDULED', 'RUNNING', 'PAUSED', 'COMPLETED', 'FAILED', 'CANCELLED'
        );

        create type "recipient_status" as enum (
            'PENDING', 'QUEUED', 'SENT', 'FAILED', 'BOUNCED'
        );

        create type "email_log_status" as enum (
            'PENDING', 'QUEUED', 'SENT', 'FAILED'
        );

        create table "user" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "email" varchar(255) not null,
            "password_hash" varchar(255) not null,
            "first_name" varchar(255) null,
            "last_name" varchar(255) null,
            "active" boolean not null default true
        );

        alter table "user" add constraint "user_email_unique" unique ("email");

        create table "smtp_account" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "user_id" int not null references "user" ("id") on update cascade on delete cascade,
            "name" varchar(255) not null,
            "host" varchar(255) not null,
            "port" int not null,
            "secure" boolean not null,
            "username" varchar(255) not null,
            "encrypted_password" text not null,
            "from_name" varchar(255) not null,
            "from_email" varchar(255) not null,
            "daily_limit" int not null,
            "min_delay_sec" int not null,
            "max_delay_sec" int not null,
            "active" boolean not null default true,
            "last_used_at" timestamptz(0) null
        );

        create table "template" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "user_id" int not null references "user" ("id") on update cascade on delete cascade,
            "name" varchar(255) not null,
            "subject" text not null,
            "body" text not null,
            "variables" text [] not null default '{}',
            "active" boolean not null default true
        );

        create table "campaign" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "user_id" int not null references "user" ("id") on update cascade on delete cascade,
            "name" varchar(255) not null,
            "template_id" int not null references "template" ("id") on update cascade on delete restrict,
            "status" campaign_status not null default 'DRAFT',
            "scheduled_at" timestamptz(0) null,
            "started_at" timestamptz(0) null,
            "completed_at" timestamptz(0) null,
            "paused_at" timestamptz(0) null,
            "total_recipients" int not null default 0,
            "sent_count" int not null default 0,
            "failed_count" int not null default 0,
            "bounce_count" int not null default 0,
            "bounce_rate" double precision not null default 0,
            "settings" jsonb not null default '{}'
        );

        create table "campaign_smtp_account" (
            "campaign_id" int not null references "campaign" ("id") on update cascade on delete cascade,
            "smtp_account_id" int not null references "smtp_account" ("id") on update cascade on delete cascade,
            primary key ("campaign_id", "smtp_account_id")
        );

        create table "campaign_recipient" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "campaign_id" int not null references "campaign" ("id") on update cascade on delete cascade,
            "email" varchar(255) not null,
            "first_name" varchar(255) null,
            "last_name" varchar(255) null,
            "variables" jsonb not null default '{}',
            "status" recipient_status not null default 'PENDING',
            "sent_at" timestamptz(0) null,
            "failed_reason" text null,
            "smtp_account_id" int null references "smtp_account" ("id") on update cascade on delete set null
        );

        alter table "campaign_recipient"
            add constraint "campaign_recipient_campaign_id_email_unique" unique ("campaign_id", "email");

        create table "email_log" (
            "id" serial primary key,
            "created_at" timestamptz(0) not null default now(),
            "updated_at" timestamptz(0) not null default now(),
            "campaign_id" int not null references "campaign" ("id") on update cascade on delete cascade,
            "recipient_id" int not null references "campaign_recipient" ("id") on update cascade on delete cascade,
            "smtp_account_id" int not null references "smtp_account" ("id") on update cascade on delete cascade,
            "status" email_log_status not null default 'PENDING',
            "subject_snapshot" text not null default '',
            "sent_at" timestamptz(0) null,
            "failed_at" timestamptz(0) null,
            "error_message" text null,
            "message_id" text null,
            "bounce_reason" text null
        );

        create index "email_log_campaign_id_idx" on "email_log" ("campaign_id");
        create index "email_log_smtp_account_id_status_idx" on "email_log" ("smtp_account_id", "status");

        create table "daily_quota" (
            "smtp_account_id" int not null references "smtp_account" ("id") on update cascade on delete cascade,
            "date" date not null,
            "sent_count" int not null default 0,
            primary key ("smtp_account_id", "date")
        );
        "#;

        db.execute_unprepared(statement).await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Custom(String::from("cannot be reverted")))
    }
}
