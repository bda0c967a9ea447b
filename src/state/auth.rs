// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth State component.
//!
//! Wraps a [`SessionStore`] and exposes the current session, user and
//! loading flag. Local state is only ever written by the store's change
//! notifications and the one-time initial session fetch; the sign-in/up/out
//! operations delegate and let the notification do the update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use validator::{Validate, ValidateEmail};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Session, User};
use crate::services::recovery::RecoveryLink;
use crate::services::session::{AuthChange, Credentials, NewPassword, SessionStore, SignUpData};
use crate::services::subscription::Subscription;

/// Observable auth state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub user: Option<User>,
    /// True until the initial session fetch resolves
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            session: None,
            user: None,
            loading: true,
        }
    }
}

/// Handle to the mounted Auth State component. Cheap to clone.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    store: Arc<dyn SessionStore>,
    sign_up_redirect: String,
    reset_redirect: String,
    tx: watch::Sender<AuthSnapshot>,
    /// Set once a change notification has been applied
    notified: AtomicBool,
    mounted: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl AuthState {
    /// Subscribe to session changes and start the initial session fetch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::initial());
        let inner = Arc::new(AuthInner {
            store: Arc::clone(&store),
            sign_up_redirect: config.auth_callback_url(),
            reset_redirect: config.reset_password_url(),
            tx,
            notified: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            subscription: Mutex::new(None),
        });

        let weak: Weak<AuthInner> = Arc::downgrade(&inner);
        let subscription = store.on_auth_state_change(Arc::new(move |change: &AuthChange| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_change(change);
            }
        }));
        if let Ok(mut slot) = inner.subscription.lock() {
            *slot = Some(subscription);
        }

        let task_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            task_inner.load_initial_session().await;
        });

        Self { inner }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.tx.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.tx.borrow().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.tx.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.tx.borrow().loading
    }

    /// Sign in with email and password. Failures are returned, never panicked.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let credentials = Credentials::new(email, password);
        credentials.validate()?;
        self.inner
            .store
            .sign_in_with_password(&credentials)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-in failed"))
    }

    /// Register a new account; the confirmation email links to `/auth/callback`.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpData> {
        let credentials = Credentials::new(email, password);
        credentials.validate()?;
        self.inner
            .store
            .sign_up(&credentials, &self.inner.sign_up_redirect)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-up failed"))
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.inner
            .store
            .sign_out()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-out failed"))
    }

    /// Send a reset email; the link points at `/reset-password`.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if !email.validate_email() {
            return Err(AppError::Validation("Enter a valid email address".to_string()));
        }
        self.inner
            .store
            .reset_password_for_email(email, &self.inner.reset_redirect)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Password reset request failed"))
    }

    /// Adopt the session carried by a password-recovery redirect.
    pub async fn recover_from_link(&self, url: &str) -> Result<Session> {
        let link = RecoveryLink::parse(url)?;
        self.inner
            .store
            .set_session(&link.access_token, &link.refresh_token)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Recovery session rejected"))
    }

    /// Set a new password for the signed-in user.
    pub async fn update_password(&self, password: &str) -> Result<User> {
        let password = NewPassword {
            password: password.to_string(),
        };
        password.validate()?;
        self.inner
            .store
            .update_password(&password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Password update failed"))
    }

    /// Dispose the change listener. Later results are ignored.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        let subscription = self
            .inner
            .subscription
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::debug!("Auth state unmounted");
        }
    }
}

impl AuthInner {
    /// Overwrite user/session from a store notification.
    fn apply_change(&self, change: &AuthChange) {
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }
        tracing::debug!(event = ?change.event, "Auth state change");
        self.tx.send_modify(|state| {
            self.notified.store(true, Ordering::SeqCst);
            state.user = change.session.as_ref().map(|s| s.user.clone());
            state.session = change.session.clone();
        });
    }

    /// Resolve the initial session exactly once and clear `loading`.
    async fn load_initial_session(&self) {
        let result = self.store.get_session().await;
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Initial session fetch failed, continuing signed out");
        }

        self.tx.send_modify(|state| {
            // A notification that landed first is newer than this fetch
            if !self.notified.load(Ordering::SeqCst) {
                if let Ok(session) = &result {
                    state.user = session.as_ref().map(|s| s.user.clone());
                    state.session = session.clone();
                }
            }
            state.loading = false;
        });

        tracing::info!(
            signed_in = self.tx.borrow().user.is_some(),
            "Initial session resolved"
        );
    }
}
