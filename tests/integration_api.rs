//! Integration tests for the VacQ booking service.
//!
//! Each test spawns the actual `vacq` binary against a disposable
//! Postgres database and drives real HTTP requests through it; the
//! binary applies migrations on startup. The suite is skipped unless
//! `VACQ_TEST_DSN` points at a database the tests may write to.

use anyhow::{bail, Context, Result};
use chrono::{Duration as TimeDelta, Local};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{
    env,
    net::TcpListener,
    process::{Child, Command, Stdio},
    time::Duration,
};
use tokio::time::sleep;
use uuid::Uuid;

/// Digest overwritten into `pending_registrations` so tests know the
/// right answer without reading the verification email.
const KNOWN_CODE: &str = "654321";
const WRONG_CODE: &str = "000000";

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TestServer {
    _child: ChildGuard,
    base: String,
    client: reqwest::Client,
    pool: PgPool,
}

impl TestServer {
    /// Spawn a server on a free port, or `None` when no test database
    /// is configured.
    async fn start(extra_args: &[&str]) -> Result<Option<Self>> {
        let Ok(dsn) = env::var("VACQ_TEST_DSN") else {
            eprintln!("Skipping integration test: VACQ_TEST_DSN is not set");
            return Ok(None);
        };

        let port = pick_port()?;
        let mut command = Command::new(env!("CARGO_BIN_EXE_vacq"));
        // Clear conflicting env vars that might leak from the host
        for var in [
            "VACQ_PORT",
            "VACQ_DSN",
            "VACQ_JWT_SECRET",
            "VACQ_LOG_LEVEL",
            "VACQ_TOKEN_TTL_SECONDS",
            "VACQ_COOKIE_TTL_SECONDS",
            "VACQ_CODE_TTL_SECONDS",
            "VACQ_RESEND_COOLDOWN_SECONDS",
            "VACQ_COOKIE_SECURE",
        ] {
            command.env_remove(var);
        }

        let child = ChildGuard(
            command
                .args([
                    "--port",
                    &port.to_string(),
                    "--dsn",
                    &dsn,
                    "--jwt-secret",
                    "integration-test-secret",
                ])
                .args(extra_args)
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn()
                .context("Failed to spawn vacq binary")?,
        );

        let base = format!("http://127.0.0.1:{port}");
        let client = reqwest::Client::new();
        wait_for_ready(&client, &base).await?;

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&dsn)
            .await
            .context("Failed to connect to the test database")?;

        Ok(Some(Self {
            _child: child,
            base,
            client,
            pool,
        }))
    }

    async fn register(
        &self,
        email: &str,
        telephone: &str,
        role: &str,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/register", self.base))
            .json(&json!({
                "name": "Integration Tester",
                "email": email,
                "password": "hunter2secret",
                "telephone": telephone,
                "role": role,
            }))
            .send()
            .await?)
    }

    async fn verify(&self, email: &str, code: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/api/v1/auth/verify", self.base))
            .json(&json!({"email": email, "verificationToken": code}))
            .send()
            .await?)
    }

    /// Overwrite the stored code digest so the plaintext in `code`
    /// becomes the valid answer for this pending registration.
    async fn set_verification_code(&self, email: &str, code: &str) -> Result<()> {
        let updated = sqlx::query("UPDATE pending_registrations SET code_hash = $1 WHERE email = $2")
            .bind(Sha256::digest(code.as_bytes()).to_vec())
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to overwrite verification code")?;
        if updated.rows_affected() != 1 {
            bail!("no pending registration found for {email}");
        }
        Ok(())
    }

    /// Register and verify a fresh account, returning its bearer token.
    async fn verified_token(&self, email: &str, telephone: &str, role: &str) -> Result<String> {
        let created = self.register(email, telephone, role).await?;
        if created.status() != StatusCode::CREATED {
            bail!("registration failed with {}", created.status());
        }
        self.set_verification_code(email, KNOWN_CODE).await?;
        let verified = self.verify(email, KNOWN_CODE).await?;
        if verified.status() != StatusCode::OK {
            bail!("verification failed with {}", verified.status());
        }
        let body: Value = verified.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("token missing from verify response")
    }

    async fn create_reservation(&self, token: &str, body: &Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/api/v1/reservation", self.base))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }
}

fn pick_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind a local port")?;
    Ok(listener
        .local_addr()
        .context("Failed to read local port")?
        .port())
}

async fn wait_for_ready(client: &reqwest::Client, base: &str) -> Result<()> {
    for _ in 0..60 {
        match client.get(format!("{base}/health")).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => sleep(Duration::from_millis(250)).await,
        }
    }
    bail!("vacq did not become ready at {base}");
}

fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

fn unique_telephone() -> String {
    format!("0{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

#[tokio::test]
async fn resend_cooldown_throttles_then_resets_mistakes() -> Result<()> {
    let Some(server) = TestServer::start(&["--resend-cooldown-seconds", "2"]).await? else {
        return Ok(());
    };
    let email = unique_email();
    let telephone = unique_telephone();

    let first = server.register(&email, &telephone, "user").await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let throttled = server.register(&email, &telephone, "user").await?;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(throttled.headers().get("retry-after").is_some());
    let body: Value = throttled.json().await?;
    assert_eq!(body["success"], json!(false));

    server.set_verification_code(&email, KNOWN_CODE).await?;
    let wrong = server.verify(&email, WRONG_CODE).await?;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    let body: Value = wrong.json().await?;
    assert_eq!(
        body["message"],
        json!("Invalid verification token. 4 attempts remaining")
    );

    sleep(Duration::from_millis(2500)).await;
    let reissued = server.register(&email, &telephone, "user").await?;
    assert_eq!(reissued.status(), StatusCode::CREATED);

    // Reissue replaces the code and starts the mistake count over.
    server.set_verification_code(&email, KNOWN_CODE).await?;
    let wrong = server.verify(&email, WRONG_CODE).await?;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    let body: Value = wrong.json().await?;
    assert_eq!(
        body["message"],
        json!("Invalid verification token. 4 attempts remaining")
    );
    Ok(())
}

#[tokio::test]
async fn fifth_wrong_code_purges_the_pending_registration() -> Result<()> {
    let Some(server) = TestServer::start(&[]).await? else {
        return Ok(());
    };
    let email = unique_email();

    let created = server.register(&email, &unique_telephone(), "user").await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    server.set_verification_code(&email, KNOWN_CODE).await?;

    for attempts_left in [4, 3, 2, 1] {
        let wrong = server.verify(&email, WRONG_CODE).await?;
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
        let body: Value = wrong.json().await?;
        assert_eq!(
            body["message"],
            json!(format!(
                "Invalid verification token. {attempts_left} attempts remaining"
            ))
        );
    }

    let locked = server.verify(&email, WRONG_CODE).await?;
    assert_eq!(locked.status(), StatusCode::BAD_REQUEST);
    let body: Value = locked.json().await?;
    assert_eq!(
        body["message"],
        json!("Too many failed attempts. Please register again")
    );

    // The row is gone, so even the right code no longer matches.
    let gone = server.verify(&email, KNOWN_CODE).await?;
    assert_eq!(gone.status(), StatusCode::BAD_REQUEST);
    let body: Value = gone.json().await?;
    assert_eq!(body["message"], json!("Invalid or expired verification token"));
    Ok(())
}

#[tokio::test]
async fn quota_blocks_fourth_reservation_until_an_admin_books_it() -> Result<()> {
    let Some(server) = TestServer::start(&[]).await? else {
        return Ok(());
    };
    let user_token = server
        .verified_token(&unique_email(), &unique_telephone(), "user")
        .await?;
    let admin_token = server
        .verified_token(&unique_email(), &unique_telephone(), "admin")
        .await?;

    // Any seeded shop open over midday works for a noon slot.
    let shop_id: Uuid = sqlx::query_scalar(
        "SELECT id FROM massage_shops WHERE open_time <= '12:00' AND close_time >= '12:00' LIMIT 1",
    )
    .fetch_one(&server.pool)
    .await
    .context("no seeded shop covers 12:00")?;

    let date = (Local::now() + TimeDelta::days(45))
        .format("%d-%m-%Y")
        .to_string();
    let booking = json!({
        "apptDate": date,
        "apptTime": "12:00",
        "massageShop": shop_id,
    });

    let mut owner_id = None;
    for _ in 0..3 {
        let created = server.create_reservation(&user_token, &booking).await?;
        assert_eq!(created.status(), StatusCode::CREATED);
        let body: Value = created.json().await?;
        owner_id = body["data"]["user"].as_str().map(str::to_string);
    }
    let owner_id = owner_id.context("reservation owner missing from response")?;

    let fourth = server.create_reservation(&user_token, &booking).await?;
    assert_eq!(fourth.status(), StatusCode::BAD_REQUEST);
    let denied: Value = fourth.json().await?;
    assert_eq!(
        denied["message"],
        json!(format!(
            "The user with ID {owner_id} has already made 3 reservations"
        ))
    );

    // Admins are exempt even when booking on the same user's behalf.
    let mut on_behalf = booking.clone();
    on_behalf["user"] = json!(owner_id);
    let fifth = server.create_reservation(&admin_token, &on_behalf).await?;
    assert_eq!(fifth.status(), StatusCode::CREATED);

    let listed = server
        .client
        .get(format!("{}/api/v1/reservation", server.base))
        .bearer_auth(&user_token)
        .send()
        .await?;
    assert_eq!(listed.status(), StatusCode::OK);
    let listed: Value = listed.json().await?;
    assert_eq!(listed["count"], json!(4));
    Ok(())
}
