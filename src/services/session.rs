// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store port: the operations the app consumes from the hosted
//! auth service.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::models::{Session, User};
use crate::services::subscription::Subscription;

/// Kind of session change reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session change notification. `session` is the full new state, not a diff.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

pub type AuthListener = Arc<dyn Fn(&AuthChange) + Send + Sync>;

/// Result of a sign-up. `session` is `None` while the email is unconfirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpData {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// Email/password pair checked before it is sent anywhere.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

/// Replacement password from the reset screen.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewPassword {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Hosted auth service as seen by the app.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, refreshed if it is about to expire.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Register for session changes until the subscription is disposed.
    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session>;

    /// Create an account; the confirmation email links to `redirect_to`.
    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<SignUpData>;

    async fn sign_out(&self) -> Result<()>;

    /// Send a reset email linking to `redirect_to`.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()>;

    /// Adopt tokens delivered through a recovery link.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session>;

    async fn update_password(&self, password: &NewPassword) -> Result<User>;
}

/// Supplies the bearer token for data requests made on the user's behalf.
#[async_trait]
pub trait BearerSource: Send + Sync {
    /// Current access token, or `None` when nobody is signed in.
    async fn access_token(&self) -> Option<String>;
}
