// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Navigation Gate: picks the active top-level screen tree.
//!
//! The gate has no state or timers of its own. [`evaluate`] is a pure
//! function of the auth and profile snapshots; [`GateWatch`] just
//! re-evaluates it whenever either upstream changes.

use serde::Serialize;
use tokio::sync::watch;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::state::auth::{AuthSnapshot, AuthState};
use crate::state::profile::{ProfileSnapshot, ProfileState};

/// Top-level screen tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub enum Screen {
    Loading,
    /// Sign-in / sign-up / reset screens
    Unauthenticated,
    /// Profile form
    ProfileIncomplete,
    /// Main app
    Ready,
}

/// Decide the screen tree for the given upstream state.
///
/// A profile snapshot that belongs to another user than the signed-in one
/// means its reload has not started yet, so it counts as loading.
pub fn evaluate(auth: &AuthSnapshot, profile: &ProfileSnapshot) -> Screen {
    let auth_user_id = auth.user.as_ref().map(|u| u.id.as_str());

    if auth.loading || profile.is_loading || profile.user_id.as_deref() != auth_user_id {
        return Screen::Loading;
    }
    if auth.user.is_none() {
        return Screen::Unauthenticated;
    }
    if !profile.is_profile_complete {
        return Screen::ProfileIncomplete;
    }
    Screen::Ready
}

/// Gate over explicit Auth/Profile handles.
#[derive(Clone)]
pub struct NavigationGate {
    auth: AuthState,
    profile: ProfileState,
}

impl NavigationGate {
    pub fn new(auth: AuthState, profile: ProfileState) -> Self {
        Self { auth, profile }
    }

    pub fn screen(&self) -> Screen {
        evaluate(&self.auth.snapshot(), &self.profile.snapshot())
    }

    /// Stream of screen changes starting from the current screen.
    pub fn watch(&self) -> GateWatch {
        let auth_rx = self.auth.subscribe();
        let profile_rx = self.profile.subscribe();
        let current = evaluate(&auth_rx.borrow(), &profile_rx.borrow());
        GateWatch {
            auth_rx,
            profile_rx,
            current,
        }
    }
}

/// Re-evaluates the gate whenever auth or profile state changes.
pub struct GateWatch {
    auth_rx: watch::Receiver<AuthSnapshot>,
    profile_rx: watch::Receiver<ProfileSnapshot>,
    current: Screen,
}

impl GateWatch {
    pub fn current(&self) -> Screen {
        self.current
    }

    /// Wait until the screen differs from the last one returned.
    ///
    /// Returns `None` once both components have been dropped.
    pub async fn next(&mut self) -> Option<Screen> {
        loop {
            tokio::select! {
                changed = self.auth_rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                changed = self.profile_rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }

            let screen = evaluate(
                &self.auth_rx.borrow_and_update(),
                &self.profile_rx.borrow_and_update(),
            );
            if screen != self.current {
                self.current = screen;
                return Some(screen);
            }
        }
    }

    /// Wait until `pred` holds for the current screen.
    pub async fn wait_for(&mut self, pred: impl Fn(Screen) -> bool) -> Option<Screen> {
        if pred(self.current) {
            return Some(self.current);
        }
        while let Some(screen) = self.next().await {
            if pred(screen) {
                return Some(screen);
            }
        }
        None
    }
}
