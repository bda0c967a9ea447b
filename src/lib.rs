// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Carebridge: client core for the nonprofit services app.
//!
//! This crate owns the session/profile bootstrap that decides which screen
//! tree the app shows, plus the data access used by the screens (profiles
//! and training quizzes) against the hosted backend.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use config::Config;
use db::{ChangeFeed, ProfileRepository, QuizRepository, RestDb};
use error::Result;
use services::{HostedAuthClient, QuizService, SessionStore};
use state::{AuthState, NavigationGate, ProfileState};

/// Mounted application state, handed explicitly to screens.
pub struct AppState {
    pub config: Config,
    pub auth: AuthState,
    pub profile: ProfileState,
    pub gate: NavigationGate,
    pub quizzes: QuizService,
}

impl AppState {
    /// Mount every component against the given collaborators.
    pub fn mount(
        config: Config,
        store: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileRepository>,
        feed: Arc<dyn ChangeFeed>,
        quizzes: Arc<dyn QuizRepository>,
    ) -> Self {
        let auth = AuthState::mount(store, &config);
        let profile = ProfileState::mount(auth.clone(), profiles, feed);
        let gate = NavigationGate::new(auth.clone(), profile.clone());
        let quizzes = QuizService::new(auth.clone(), quizzes);

        Self {
            config,
            auth,
            profile,
            gate,
            quizzes,
        }
    }

    /// Mount against the hosted backend described by `config`.
    pub fn connect(config: Config) -> Result<Self> {
        let auth_client = Arc::new(HostedAuthClient::new(&config)?);
        let db = Arc::new(RestDb::new(&config, auth_client.clone())?);

        Ok(Self::mount(
            config,
            auth_client,
            db.clone(),
            db.clone(),
            db,
        ))
    }

    /// Tear down in reverse mount order.
    pub fn unmount(&self) {
        self.profile.unmount();
        self.auth.unmount();
    }
}
