// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted auth API client implementing [`SessionStore`].
//!
//! Handles:
//! - Password sign-in, sign-up with confirmation redirect, sign-out
//! - Password reset emails and recovery-link sessions
//! - Access token refresh when the session is about to expire
//! - Fan-out of session changes to registered listeners

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Session, User};
use crate::services::session::{
    AuthChange, AuthEvent, AuthListener, BearerSource, Credentials, NewPassword, SessionStore,
    SignUpData,
};
use crate::services::subscription::{ListenerSet, Subscription};

/// Margin before access token expiry when we proactively refresh.
const SESSION_REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when neither the response nor the token carries an expiry.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Client for the hosted auth REST API.
pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    /// Current session, if any (never persisted)
    current: RwLock<Option<Session>>,
    /// Serializes refreshes so concurrent callers spend the refresh token once.
    refresh_lock: Mutex<()>,
    listeners: ListenerSet<AuthChange>,
}

impl HostedAuthClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: config.auth_api_url(),
            anon_key: config.anon_key.clone(),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            listeners: ListenerSet::new(),
        })
    }

    // ─── Session bookkeeping ─────────────────────────────────────

    async fn store_and_emit(&self, event: AuthEvent, session: Option<Session>) {
        *self.current.write().await = session.clone();
        tracing::debug!(
            event = ?event,
            user_id = session.as_ref().map(|s| s.user.id.as_str()).unwrap_or("-"),
            "Session changed"
        );
        self.listeners.emit(&AuthChange { event, session });
    }

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let url = format!("{}/token?grant_type=refresh_token", self.base_url);
        let response = self
            .request(reqwest::Method::POST, &url, None)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Token refresh request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await?;
        Ok(token.into_session())
    }

    /// Request builder carrying the API key and the given bearer (anon key if none).
    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User> {
        let url = format!("{}/user", self.base_url);
        let response = self
            .request(reqwest::Method::GET, &url, Some(access_token))
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        check_response_json(response).await
    }
}

#[async_trait]
impl SessionStore for HostedAuthClient {
    async fn get_session(&self) -> Result<Option<Session>> {
        let margin = Duration::seconds(SESSION_REFRESH_MARGIN_SECS);

        match self.current.read().await.as_ref() {
            None => return Ok(None),
            Some(session) if !session.is_expired(margin) => return Ok(Some(session.clone())),
            Some(_) => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        let refresh_token = match self.current.read().await.as_ref() {
            None => return Ok(None),
            Some(session) if !session.is_expired(margin) => return Ok(Some(session.clone())),
            Some(session) => session.refresh_token.clone(),
        };

        tracing::info!("Access token expiring, refreshing session");
        match self.refresh(&refresh_token).await {
            Ok(session) => {
                self.store_and_emit(AuthEvent::TokenRefreshed, Some(session.clone()))
                    .await;
                Ok(Some(session))
            }
            Err(AppError::Auth(msg)) => {
                // Refresh token revoked or reused: the session is gone for good
                tracing::warn!(error = %msg, "Session refresh rejected, signing out locally");
                self.store_and_emit(AuthEvent::SignedOut, None).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.add(listener)
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let response = self
            .request(reqwest::Method::POST, &url, None)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let session = check_response_json::<TokenResponse>(response)
            .await?
            .into_session();
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.store_and_emit(AuthEvent::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<SignUpData> {
        let url = format!(
            "{}/signup?redirect_to={}",
            self.base_url,
            urlencoding::encode(redirect_to)
        );
        let response = self
            .request(reqwest::Method::POST, &url, None)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let body: serde_json::Value = check_response_json(response).await?;
        let data = parse_sign_up(body)?;

        if let Some(session) = &data.session {
            // Email confirmation disabled upstream: the account is live already
            self.store_and_emit(AuthEvent::SignedIn, Some(session.clone()))
                .await;
        }
        tracing::info!(
            confirmed = data.session.is_some(),
            "Sign-up accepted"
        );
        Ok(data)
    }

    async fn sign_out(&self) -> Result<()> {
        let access_token = match self.current.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Ok(()),
        };

        let url = format!("{}/logout", self.base_url);
        let response = self
            .request(reqwest::Method::POST, &url, Some(&access_token))
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() && !matches!(status.as_u16(), 401 | 403 | 404) {
            return Err(error_from_response(response).await);
        }

        tracing::info!("Signed out");
        self.store_and_emit(AuthEvent::SignedOut, None).await;
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        let url = format!(
            "{}/recover?redirect_to={}",
            self.base_url,
            urlencoding::encode(redirect_to)
        );
        let response = self
            .request(reqwest::Method::POST, &url, None)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        check_response(response).await?;
        tracing::info!("Password reset email requested");
        Ok(())
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session> {
        let expires_at = token_expiry(access_token);

        let session = match expires_at {
            Some(exp) if exp - Duration::seconds(SESSION_REFRESH_MARGIN_SECS) > Utc::now() => {
                let user = self.fetch_user(access_token).await?;
                Session {
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.to_string(),
                    expires_at: exp,
                    user,
                }
            }
            // Expired or unreadable access token: the refresh token decides
            _ => self.refresh(refresh_token).await?,
        };

        tracing::info!(user_id = %session.user.id, "Session adopted from recovery link");
        self.store_and_emit(AuthEvent::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    async fn update_password(&self, password: &NewPassword) -> Result<User> {
        let session = self.get_session().await?.ok_or(AppError::Unauthenticated)?;

        let url = format!("{}/user", self.base_url);
        let response = self
            .request(reqwest::Method::PUT, &url, Some(&session.access_token))
            .json(password)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let user: User = check_response_json(response).await?;
        tracing::info!(user_id = %user.id, "Password updated");
        self.store_and_emit(
            AuthEvent::UserUpdated,
            Some(Session {
                user: user.clone(),
                ..session
            }),
        )
        .await;
        Ok(user)
    }
}

#[async_trait]
impl BearerSource for HostedAuthClient {
    async fn access_token(&self) -> Option<String> {
        match self.get_session().await {
            Ok(session) => session.map(|s| s.access_token),
            Err(e) => {
                tracing::warn!(error = %e, "No usable session for data request");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types and response handling
// ─────────────────────────────────────────────────────────────────────────────

/// Token grant response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
            .or_else(|| token_expiry(&self.access_token))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_SESSION_TTL_SECS));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim of an access token without verifying its signature.
///
/// The client never holds the signing key; the server verifies every request.
fn token_expiry(access_token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaims>(access_token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
}

/// Sign-up answers with a full token grant when confirmation is disabled,
/// and with the bare user otherwise.
fn parse_sign_up(body: serde_json::Value) -> Result<SignUpData> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Auth(format!("Unexpected sign-up response: {}", e)))?;
        let session = token.into_session();
        return Ok(SignUpData {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    let user = user_from_value(body.get("user").cloned().unwrap_or(body))?;
    Ok(SignUpData {
        user,
        session: None,
    })
}

fn user_from_value(value: serde_json::Value) -> Result<Option<User>> {
    if value.get("id").is_none() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| AppError::Auth(format!("Unexpected sign-up response: {}", e)))
}

/// Error body shapes used by the auth API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Convert a failed response into an error carrying the server's message.
///
/// Client errors (bad credentials, unconfirmed email, ...) are shown to the
/// user verbatim; server errors are reported as connectivity problems.
async fn error_from_response(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_server_error() {
        AppError::Network(format!("HTTP {}: {}", status, message))
    } else {
        AppError::Auth(message)
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await)
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Network(format!("JSON parse error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn jwt_expiring_at(exp: i64) -> String {
        #[derive(serde::Serialize)]
        struct Claims {
            sub: String,
            aud: String,
            exp: i64,
        }
        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: "user-1".to_string(),
                aud: "authenticated".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_token_expiry_reads_exp_without_key() {
        let exp = Utc::now().timestamp() + 600;
        let parsed = token_expiry(&jwt_expiring_at(exp)).unwrap();
        assert_eq!(parsed.timestamp(), exp);
    }

    #[test]
    fn test_token_expiry_accepts_expired_tokens() {
        let exp = Utc::now().timestamp() - 600;
        assert_eq!(token_expiry(&jwt_expiring_at(exp)).unwrap().timestamp(), exp);
        assert!(token_expiry("not-a-jwt").is_none());
    }

    #[test]
    fn test_into_session_prefers_expires_at() {
        let token = TokenResponse {
            access_token: "opaque".to_string(),
            refresh_token: "r".to_string(),
            expires_in: Some(10),
            expires_at: Some(2_000_000_000),
            user: User {
                id: "u".to_string(),
                email: None,
            },
        };
        assert_eq!(token.into_session().expires_at.timestamp(), 2_000_000_000);
    }

    #[test]
    fn test_into_session_falls_back_to_default_ttl() {
        let token = TokenResponse {
            access_token: "opaque".to_string(),
            refresh_token: "r".to_string(),
            expires_in: None,
            expires_at: None,
            user: User {
                id: "u".to_string(),
                email: None,
            },
        };
        let session = token.into_session();
        assert!(!session.is_expired(Duration::seconds(DEFAULT_SESSION_TTL_SECS - 60)));
    }

    #[test]
    fn test_parse_sign_up_unconfirmed_user() {
        let body = serde_json::json!({
            "id": "new-user",
            "email": "new@example.org",
            "confirmation_sent_at": "2026-01-01T00:00:00Z"
        });
        let data = parse_sign_up(body).unwrap();
        assert_eq!(data.user.unwrap().id, "new-user");
        assert!(data.session.is_none());
    }

    #[test]
    fn test_parse_sign_up_with_session() {
        let body = serde_json::json!({
            "access_token": jwt_expiring_at(Utc::now().timestamp() + 3600),
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": "new-user", "email": "new@example.org" }
        });
        let data = parse_sign_up(body).unwrap();
        assert_eq!(data.session.unwrap().user.id, "new-user");
        assert_eq!(data.user.unwrap().email.as_deref(), Some("new@example.org"));
    }

    #[test]
    fn test_error_body_message_priority() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: ErrorBody = serde_json::from_str(r#"{"msg":"Email not confirmed"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Email not confirmed"));
    }
}
