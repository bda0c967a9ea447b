// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Carebridge headless session monitor
//!
//! Mounts the auth and profile components against the hosted backend and
//! logs every navigation gate transition. Handy for checking a deployment's
//! auth/profile wiring without a device.

use carebridge::{config::Config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(service = %config.service_url, site = %config.site_url, "Starting Carebridge monitor");

    let app = AppState::connect(config)?;
    let mut gate = app.gate.watch();
    tracing::info!(screen = ?gate.current(), "Navigation gate mounted");

    // Optional scripted sign-in
    if let (Ok(email), Ok(password)) = (
        std::env::var("CAREBRIDGE_EMAIL"),
        std::env::var("CAREBRIDGE_PASSWORD"),
    ) {
        match app.auth.sign_in(&email, &password).await {
            Ok(session) => tracing::info!(user_id = %session.user.id, "Signed in"),
            Err(e) => tracing::error!(error = %e, message = %e.user_message(), "Sign-in failed"),
        }
    }

    loop {
        tokio::select! {
            screen = gate.next() => match screen {
                Some(screen) => {
                    let profile = app.profile.snapshot();
                    tracing::info!(
                        screen = ?screen,
                        user_id = profile.user_id.as_deref().unwrap_or("-"),
                        profile_complete = profile.is_profile_complete,
                        "Navigation gate changed"
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    app.unmount();
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carebridge=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
