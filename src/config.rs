// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! The hosted backend URL and public API key are read once at startup so
//! staging and production builds share a binary.

use std::env;
use std::time::Duration;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hosted backend base URL (auth lives under `/auth/v1`, tables under `/rest/v1`)
    pub service_url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    /// The app's own deployed origin, used to build email redirect targets
    pub site_url: String,
    /// How often the profile change feed polls for row updates
    pub profile_poll_interval: Duration,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let service_url = env::var("CAREBRIDGE_SERVICE_URL")
            .map_err(|_| ConfigError::Missing("CAREBRIDGE_SERVICE_URL"))?;
        if !service_url.starts_with("http://") && !service_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "CAREBRIDGE_SERVICE_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        Ok(Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            anon_key: env::var("CAREBRIDGE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CAREBRIDGE_ANON_KEY"))?,
            site_url: env::var("CAREBRIDGE_SITE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string())
                .trim_end_matches('/')
                .to_string(),
            profile_poll_interval: Duration::from_secs(secs_var(
                "CAREBRIDGE_PROFILE_POLL_SECS",
                5,
            )?),
            http_timeout: Duration::from_secs(secs_var("CAREBRIDGE_HTTP_TIMEOUT_SECS", 15)?),
        })
    }

    /// Config for tests, pointing at a local mock backend.
    pub fn test_default() -> Self {
        Self {
            service_url: "http://127.0.0.1:54321".to_string(),
            anon_key: "test_anon_key".to_string(),
            site_url: "http://localhost:8081".to_string(),
            profile_poll_interval: Duration::from_millis(50),
            http_timeout: Duration::from_secs(5),
        }
    }

    /// Redirect target embedded in sign-up confirmation emails.
    pub fn auth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }

    /// Redirect target embedded in password reset emails.
    pub fn reset_password_url(&self) -> String {
        format!("{}/reset-password", self.site_url)
    }

    /// Base URL of the hosted auth API.
    pub fn auth_api_url(&self) -> String {
        format!("{}/auth/v1", self.service_url)
    }

    /// Base URL of the hosted table API.
    pub fn rest_api_url(&self) -> String {
        format!("{}/rest/v1", self.service_url)
    }
}

fn secs_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::Invalid {
                name,
                reason: format!("expected a positive number of seconds, got {:?}", raw),
            }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
