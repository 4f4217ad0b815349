//! Guess Tunes session demo
//!
//! Drives an `AuthSession` through its whole lifecycle against the in-memory
//! backend:
//! - boot without a refresh cookie (guest)
//! - failed and successful login
//! - transparent recovery from an expired access token
//! - concurrent 401s sharing one refresh
//! - refresh session expiry dropping the session to guest
//!
//! Pass `--live` to talk to a real server instead (`GUESS_TUNES_API_URL`,
//! default `http://localhost:8000`).
//!
//! Run with: cargo run -p session-demo

use futures::StreamExt;
use guess_tunes_client::feedback::{LOGIN_FAILED, error_message};
use guess_tunes_client::transport::mock::MOCK_PROFILE_PATH;
use guess_tunes_client::{
    ApiClient, AuthSession, ClientConfig, MockBackend, RouteDecision, RouteGuard,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn describe(decision: &RouteDecision) -> String {
    match decision {
        RouteDecision::Pending => "Loading...".to_string(),
        RouteDecision::Redirect { to } => format!("redirect to {to}"),
        RouteDecision::Allow => "show protected page".to_string(),
    }
}

fn phase(name: &str) {
    println!("\n== {name}");
    tracing::info!(phase = name, "Demo phase started");
}

async fn show_profile(client: &ApiClient) {
    match client.get_json::<serde_json::Value>(MOCK_PROFILE_PATH).await {
        Ok(profile) => println!("  profile: {profile}"),
        Err(e) => {
            tracing::debug!(error = %e, "Profile request failed");
            println!("  profile request failed: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("session_demo=info,warn")),
        )
        .init();

    let live = std::env::args().any(|arg| arg == "--live");
    let config = ClientConfig::from_env()?;
    let backend = MockBackend::new(config.endpoints.clone()).with_latency(Duration::from_millis(50));

    let client = if live {
        println!("Using {}", config.base_url);
        Arc::new(ApiClient::new(config)?)
    } else {
        println!("Using the in-memory backend");
        Arc::new(
            ApiClient::builder()
                .config(config)
                .transport(backend.clone())
                .build()?,
        )
    };

    let session = AuthSession::new(Arc::clone(&client));
    let guard = RouteGuard::default();

    let mut changes = Box::pin(session.changes());
    let watcher = tokio::spawn(async move {
        while let Some(snapshot) = changes.next().await {
            match snapshot.username() {
                Some(name) => println!("[session] {} as {name}", snapshot.status),
                None => println!("[session] {}", snapshot.status),
            }
        }
    });

    phase("Boot");
    println!("  guard: {}", describe(&guard.decide(&session.snapshot())));
    let status = session.boot().await;
    tracing::info!(%status, "Session booted");
    println!("  guard: {}", describe(&guard.decide(&session.snapshot())));

    phase("Login with a wrong password");
    if let Err(e) = session.login("john@42.fr", "wrong").await {
        println!("  form says: {}", error_message(&e, LOGIN_FAILED));
    }

    phase("Login");
    let user = session.login("john@42.fr", "secret").await?;
    println!("  signed in as {}", user.username);
    show_profile(&client).await;

    if !live {
        phase("Access token expires");
        backend.expire_access_tokens();
        let cycles_before = client.coordinator().cycles_started();
        let (a, b, c) = tokio::join!(
            client.get(MOCK_PROFILE_PATH),
            client.get(MOCK_PROFILE_PATH),
            client.get(MOCK_PROFILE_PATH)
        );
        let succeeded = [a, b, c].iter().filter(|r| r.is_ok()).count();
        let refreshes = client.coordinator().cycles_started() - cycles_before;
        tracing::info!(succeeded, refreshes, "Concurrent requests settled");
        println!("  3 concurrent requests: {succeeded} succeeded, {refreshes} refresh call(s)");

        phase("Refresh cookie expires too");
        backend.expire_access_tokens();
        backend.end_refresh_session();
        show_profile(&client).await;
        println!("  guard: {}", describe(&guard.decide(&session.snapshot())));

        phase("Login again");
        session.login("john@42.fr", "secret").await?;
    }

    phase("Logout");
    session.logout().await;
    println!("  guard: {}", describe(&guard.decide(&session.snapshot())));

    drop(session);
    watcher.await?;
    Ok(())
}
