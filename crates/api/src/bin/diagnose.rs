//! ICVK environment diagnostics
//!
//! Checks that the deployment environment can actually serve registrations:
//! required variables, PostgreSQL reachability, Cloudinary credentials and the
//! mail relay.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p icvk-api --bin diagnose
//! ```
//!
//! Every check runs even when an earlier one fails. The exit code is always 0;
//! read the report.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use icvk_common::config::AppConfig;
use icvk_notifier::{MailConfig, MailSession};

const REQUIRED_VARS: &[&str] = &[
    "DATABASE_URL",
    "JWT_SECRET",
    "CLOUDINARY_CLOUD_NAME",
    "CLOUDINARY_API_KEY",
    "CLOUDINARY_API_SECRET",
    "EMAIL_USER",
    "EMAIL_PASS",
];

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    println!("=== ICVK Diagnostics ===");

    check_env();
    let config = match AppConfig::from_env() {
        Ok(config) => Some(config),
        Err(e) => {
            println!("  FAIL configuration does not load: {}", e);
            None
        }
    };

    check_database().await;
    check_cloudinary(config.as_ref()).await;
    check_mail(config.as_ref()).await;

    println!();
    println!("=== Diagnostics Complete ===");
    Ok(())
}

fn check_env() {
    println!();
    println!("--- 1. Environment Variables ---");

    let missing: Vec<&str> = REQUIRED_VARS
        .iter()
        .copied()
        .filter(|key| env(key).is_none())
        .collect();

    if missing.is_empty() {
        println!("  OK   all required environment variables are present");
    } else {
        println!("  FAIL missing: {}", missing.join(", "));
    }
}

async fn check_database() {
    println!();
    println!("--- 2. PostgreSQL Connection ---");

    let Some(url) = env("DATABASE_URL") else {
        println!("  SKIP DATABASE_URL is not set");
        return;
    };

    let result = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&url)
        .await;

    match result {
        Ok(pool) => {
            match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations")
                .fetch_one(&pool)
                .await
            {
                Ok(count) => println!("  OK   connected, {} registrations stored", count),
                Err(e) => println!("  WARN connected, but registrations table unreadable: {}", e),
            }
            pool.close().await;
        }
        Err(e) => println!("  FAIL connection failed: {}", e),
    }
}

async fn check_cloudinary(config: Option<&AppConfig>) {
    println!();
    println!("--- 3. Cloudinary ---");

    let Some(config) = config else {
        println!("  SKIP configuration unavailable");
        return;
    };
    let (Some(cloud), Some(key), Some(secret)) = (
        &config.cloudinary_cloud_name,
        &config.cloudinary_api_key,
        &config.cloudinary_api_secret,
    ) else {
        println!("  SKIP Cloudinary credentials incomplete");
        return;
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            println!("  FAIL could not build HTTP client: {}", e);
            return;
        }
    };

    let url = format!("https://api.cloudinary.com/v1_1/{}/ping", cloud);
    match client.get(&url).basic_auth(key, Some(secret)).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body = resp.text().await.unwrap_or_default();
            println!("  OK   ping successful: {}", body.trim());
        }
        Ok(resp) => println!("  FAIL ping returned HTTP {}", resp.status()),
        Err(e) => println!("  FAIL ping failed: {}", e),
    }
}

async fn check_mail(config: Option<&AppConfig>) {
    println!();
    println!("--- 4. Mail Relay ---");

    let Some(config) = config else {
        println!("  SKIP configuration unavailable");
        return;
    };
    let Some(mail) = MailConfig::from_app_config(config) else {
        println!("  SKIP credentials missing, confirmation emails would be disabled");
        return;
    };
    let relay = mail.relay_host.clone();

    match MailSession::connect(mail) {
        Ok(session) => match session.verify().await {
            Ok(()) => println!("  OK   relay {} verified", relay),
            Err(e) => println!("  FAIL {}", e),
        },
        Err(e) => println!("  FAIL {}", e),
    }
}
