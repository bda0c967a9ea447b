// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile State component.
//!
//! Follows the Auth State user: every user transition re-subscribes to the
//! user's row and reloads the profile, and every row notification triggers a
//! full reload. Reloads are not sequenced, so each one is tagged with a
//! generation number and the user it was started for; only the newest
//! reload for the still-current user may write its result.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use validator::Validate;

use crate::db::{ChangeFeed, ProfileRepository};
use crate::error::{AppError, Result};
use crate::models::{is_profile_complete, Profile};
use crate::services::subscription::Subscription;
use crate::state::auth::{AuthSnapshot, AuthState};

/// Outcome of the last profile load.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileStatus {
    Loaded(Profile),
    /// Signed out, or signed in without a stored row
    Empty,
    /// The row could not be read; treated as incomplete, never defaulted
    Error(String),
}

/// Observable profile state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    /// User this snapshot was loaded for
    pub user_id: Option<String>,
    pub status: ProfileStatus,
    pub is_loading: bool,
    pub is_profile_complete: bool,
}

impl ProfileSnapshot {
    fn initial() -> Self {
        Self {
            user_id: None,
            status: ProfileStatus::Empty,
            is_loading: true,
            is_profile_complete: false,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.status {
            ProfileStatus::Loaded(profile) => Some(profile),
            ProfileStatus::Empty | ProfileStatus::Error(_) => None,
        }
    }
}

/// Handle to the mounted Profile State component. Cheap to clone.
#[derive(Clone)]
pub struct ProfileState {
    inner: Arc<ProfileInner>,
}

struct ProfileInner {
    auth: AuthState,
    repo: Arc<dyn ProfileRepository>,
    feed: Arc<dyn ChangeFeed>,
    tx: watch::Sender<ProfileSnapshot>,
    /// Bumped by every reload and every successful update
    generation: AtomicU64,
    mounted: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileState {
    /// Start following `auth`. Must be called from within a Tokio runtime.
    pub fn mount(
        auth: AuthState,
        repo: Arc<dyn ProfileRepository>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        let (tx, _rx) = watch::channel(ProfileSnapshot::initial());
        let auth_rx = auth.subscribe();
        let inner = Arc::new(ProfileInner {
            auth,
            repo,
            feed,
            tx,
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
            driver: Mutex::new(None),
        });

        let handle = tokio::spawn(drive(Arc::downgrade(&inner), auth_rx));
        if let Ok(mut slot) = inner.driver.lock() {
            *slot = Some(handle);
        }

        Self { inner }
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.inner.tx.subscribe()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.tx.borrow().profile().cloned()
    }

    pub fn is_profile_complete(&self) -> bool {
        self.inner.tx.borrow().is_profile_complete
    }

    pub fn is_loading(&self) -> bool {
        self.inner.tx.borrow().is_loading
    }

    /// Reload the profile of whoever is signed in right now.
    pub async fn reload(&self) {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            return;
        }
        // Claim the generation before reading the user, so the newest
        // reload always sees the newest user
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let user = self.inner.auth.user();
        let user_id = user.as_ref().map(|u| u.id.clone());

        let Some(user) = user else {
            self.inner.apply(generation, None, ProfileStatus::Empty);
            return;
        };

        // Only the newest reload may raise the loading flag
        self.inner.tx.send_if_modified(|state| {
            if generation != self.inner.generation.load(Ordering::SeqCst) {
                return false;
            }
            if state.user_id != user_id {
                state.user_id = user_id.clone();
                state.status = ProfileStatus::Empty;
                state.is_profile_complete = false;
            }
            state.is_loading = true;
            true
        });

        let status = match self.inner.repo.get_profile(&user.id).await {
            Ok(Some(row)) => ProfileStatus::Loaded(Profile::from_row(&row, user.email.as_deref())),
            Ok(None) => ProfileStatus::Empty,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Profile load failed");
                ProfileStatus::Error(e.to_string())
            }
        };

        self.inner.apply(generation, Some(&user.id), status);
    }

    /// Save the form and replace the in-memory profile.
    ///
    /// Only first/last name, phone and purpose are persisted; address,
    /// emergency contact and notification preferences have no column and
    /// are kept in memory until the next reload.
    ///
    /// `Ok` means the row was written. If the signed-in user changed while
    /// the write was in flight, the in-memory profile is left to the new
    /// user's reload and is not replaced.
    pub async fn update_profile(&self, mut profile: Profile) -> Result<Profile> {
        let user = self.inner.auth.user().ok_or(AppError::Unauthenticated)?;
        profile.id = user.id.clone();
        profile.validate()?;

        self.inner
            .repo
            .upsert_profile(&profile.to_write(Utc::now()))
            .await
            .inspect_err(|e| tracing::warn!(user_id = %user.id, error = %e, "Profile save failed"))?;

        // Invalidate reloads that read the row before this write
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.inner.apply(
            generation,
            Some(&user.id),
            ProfileStatus::Loaded(profile.clone()),
        ) {
            tracing::info!(
                user_id = %user.id,
                complete = profile.is_complete(),
                "Profile updated"
            );
        } else {
            tracing::debug!(
                user_id = %user.id,
                "Profile saved, but the signed-in user changed; in-memory profile kept"
            );
        }
        Ok(profile)
    }

    /// Forget the in-memory profile.
    pub fn clear_profile(&self) {
        self.inner.tx.send_modify(|state| {
            state.status = ProfileStatus::Empty;
            state.is_profile_complete = false;
        });
    }

    /// Stop following auth, dispose the row subscription and ignore late results.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        let handle = self.inner.driver.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            // Dropping the driver future disposes its row subscription
            handle.abort();
            tracing::debug!("Profile state unmounted");
        }
    }
}

impl ProfileInner {
    /// Write a load result if it is still wanted. Returns whether it was applied.
    fn apply(&self, generation: u64, user_id: Option<&str>, status: ProfileStatus) -> bool {
        let current_user = self.auth.user();
        let current_user_id = current_user.as_ref().map(|u| u.id.as_str());

        self.tx.send_if_modified(|state| {
            if !self.mounted.load(Ordering::SeqCst) {
                tracing::debug!("Profile result dropped after unmount");
                return false;
            }
            if generation != self.generation.load(Ordering::SeqCst) {
                tracing::debug!(generation, "Superseded profile result dropped");
                return false;
            }
            if current_user_id != user_id {
                tracing::debug!("Profile result for a previous user dropped");
                return false;
            }

            state.user_id = user_id.map(str::to_string);
            state.is_profile_complete = match &status {
                ProfileStatus::Loaded(profile) => is_profile_complete(Some(profile)),
                ProfileStatus::Empty | ProfileStatus::Error(_) => false,
            };
            state.status = status;
            state.is_loading = false;
            true
        })
    }
}

/// Follow the auth user: re-subscribe and reload on every transition, and
/// reload on every row notification for the current user.
async fn drive(inner: Weak<ProfileInner>, mut auth_rx: watch::Receiver<AuthSnapshot>) {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<String>();
    let mut following: Option<Option<String>> = None;
    let mut row_subscription: Option<Subscription> = None;

    loop {
        let user_id = auth_rx
            .borrow_and_update()
            .user
            .as_ref()
            .map(|u| u.id.clone());

        if following.as_ref() != Some(&user_id) {
            let Some(strong) = inner.upgrade() else {
                break;
            };

            if let Some(subscription) = row_subscription.take() {
                subscription.unsubscribe();
            }
            if let Some(id) = &user_id {
                let tx = notify_tx.clone();
                let changed_id = id.clone();
                row_subscription = Some(strong.feed.subscribe_profile(
                    id,
                    Arc::new(move || {
                        let _ = tx.send(changed_id.clone());
                    }),
                ));
            }

            tracing::debug!(
                user_id = user_id.as_deref().unwrap_or("-"),
                "Auth user changed, reloading profile"
            );
            following = Some(user_id.clone());
            spawn_reload(strong);
        }

        tokio::select! {
            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(changed_id) = notify_rx.recv() => {
                if following.as_ref().and_then(|f| f.as_deref()) == Some(changed_id.as_str()) {
                    match inner.upgrade() {
                        Some(strong) => spawn_reload(strong),
                        None => break,
                    }
                }
            }
        }
    }

    if let Some(subscription) = row_subscription.take() {
        subscription.unsubscribe();
    }
}

fn spawn_reload(inner: Arc<ProfileInner>) {
    let state = ProfileState { inner };
    tokio::spawn(async move { state.reload().await });
}
