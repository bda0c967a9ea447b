// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory collaborators for component tests.

#![allow(dead_code)]

use async_trait::async_trait;
use carebridge::config::Config;
use carebridge::db::{ChangeFeed, ChangeListener, ProfileRepository, QuizRepository};
use carebridge::error::{AppError, Result};
use carebridge::models::{ProfileRow, ProfileWrite, QuizContent, Session, SubmissionRecord, User, UserPurpose};
use carebridge::services::{
    AuthChange, AuthEvent, AuthListener, Credentials, ListenerSet, NewPassword, SessionStore,
    SignUpData, Subscription,
};
use carebridge::state::{AuthState, NavigationGate, ProfileState};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ─── Helpers ─────────────────────────────────────────────────

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{}@example.org", id)),
    }
}

pub fn session_for(id: &str) -> Session {
    Session {
        access_token: format!("access-{}", id),
        refresh_token: format!("refresh-{}", id),
        expires_at: Utc::now() + Duration::hours(1),
        user: user(id),
    }
}

/// Row with every required field filled in.
pub fn complete_row(id: &str, first: &str, last: &str) -> ProfileRow {
    ProfileRow {
        id: id.to_string(),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        email: Some(format!("{}@example.org", id)),
        phone: None,
        user_purpose: Some(UserPurpose::Patient),
        profile_completed: None,
        created_at: None,
        updated_at: None,
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

/// Let spawned tasks run without waiting for anything in particular.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}

pub struct Mounted {
    pub store: Arc<FakeSessionStore>,
    pub repo: Arc<FakeProfileRepository>,
    pub feed: Arc<ManualChangeFeed>,
    pub auth: AuthState,
    pub profile: ProfileState,
    pub gate: NavigationGate,
}

/// Mount auth, profile and gate against fresh fakes.
pub fn mount(store: FakeSessionStore, repo: FakeProfileRepository) -> Mounted {
    let store = Arc::new(store);
    let repo = Arc::new(repo);
    let feed = Arc::new(ManualChangeFeed::default());

    let auth = AuthState::mount(store.clone(), &Config::test_default());
    let profile = ProfileState::mount(auth.clone(), repo.clone(), feed.clone());
    let gate = NavigationGate::new(auth.clone(), profile.clone());

    Mounted {
        store,
        repo,
        feed,
        auth,
        profile,
        gate,
    }
}

// ─── Session store ───────────────────────────────────────────

#[derive(Default)]
pub struct FakeSessionStore {
    current: Mutex<Option<Session>>,
    listeners: ListenerSet<AuthChange>,
    accounts: Mutex<HashMap<String, (String, User)>>,
    recovery_tokens: Mutex<HashMap<String, User>>,
    pub get_session_calls: AtomicUsize,
    pub fail_get_session: AtomicBool,
    block_get_session: AtomicBool,
    release_get_session: Notify,
    /// (email, redirect_to) per sign-up
    pub sign_ups: Mutex<Vec<(String, String)>>,
    /// (email, redirect_to) per reset request
    pub resets: Mutex<Vec<(String, String)>>,
    pub passwords_set: Mutex<Vec<String>>,
}

impl FakeSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, id: &str) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            (
                password.to_string(),
                User {
                    id: id.to_string(),
                    email: Some(email.to_string()),
                },
            ),
        );
        self
    }

    pub fn with_session(self, id: &str) -> Self {
        *self.current.lock().unwrap() = Some(session_for(id));
        self
    }

    pub fn with_recovery_token(self, access_token: &str, id: &str) -> Self {
        self.recovery_tokens
            .lock()
            .unwrap()
            .insert(access_token.to_string(), user(id));
        self
    }

    /// Hold `get_session` until `release_initial_session` is called.
    pub fn blocking_initial_session(self) -> Self {
        self.block_get_session.store(true, Ordering::SeqCst);
        self
    }

    pub fn release_initial_session(&self) {
        self.release_get_session.notify_one();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Simulate a change that originates in the store itself.
    pub fn push(&self, event: AuthEvent, session: Option<Session>) {
        *self.current.lock().unwrap() = session.clone();
        self.listeners.emit(&AuthChange { event, session });
    }
}

#[async_trait]
impl SessionStore for FakeSessionStore {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        // Snapshot before waiting so a held fetch returns stale data
        let snapshot = self.current.lock().unwrap().clone();
        if self.block_get_session.load(Ordering::SeqCst) {
            self.release_get_session.notified().await;
        }
        if self.fail_get_session.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection refused".to_string()));
        }
        Ok(snapshot)
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.add(listener)
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        let user = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&credentials.email) {
                Some((password, user)) if *password == credentials.password => user.clone(),
                _ => return Err(AppError::Auth("Invalid login credentials".to_string())),
            }
        };
        let session = session_for(&user.id);
        self.push(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials, redirect_to: &str) -> Result<SignUpData> {
        self.sign_ups
            .lock()
            .unwrap()
            .push((credentials.email.clone(), redirect_to.to_string()));
        Ok(SignUpData {
            user: Some(User {
                id: format!("new-{}", credentials.email),
                email: Some(credentials.email.clone()),
            }),
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.push(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.resets
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session> {
        let user = self
            .recovery_tokens
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::Auth("Invalid token".to_string()))?;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user,
        };
        self.push(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn update_password(&self, password: &NewPassword) -> Result<User> {
        let session = self
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or(AppError::Unauthenticated)?;
        self.passwords_set
            .lock()
            .unwrap()
            .push(password.password.clone());
        self.push(AuthEvent::UserUpdated, Some(session.clone()));
        Ok(session.user)
    }
}

// ─── Profile repository ──────────────────────────────────────

#[derive(Default)]
pub struct FakeProfileRepository {
    rows: Mutex<HashMap<String, ProfileRow>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    held_writes: Mutex<HashMap<String, Arc<Notify>>>,
    pub reads: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<ProfileWrite>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FakeProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(self, row: ProfileRow) -> Self {
        self.put_row(row);
        self
    }

    pub fn put_row(&self, row: ProfileRow) {
        self.rows.lock().unwrap().insert(row.id.clone(), row);
    }

    pub fn row(&self, id: &str) -> Option<ProfileRow> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    /// Make reads for `id` wait (after taking their snapshot) until released.
    pub fn hold(&self, id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.held
            .lock()
            .unwrap()
            .insert(id.to_string(), notify.clone());
        notify
    }

    /// Make upserts for `id` wait (after being recorded) until released.
    pub fn hold_writes(&self, id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.held_writes
            .lock()
            .unwrap()
            .insert(id.to_string(), notify.clone());
        notify
    }

    pub fn unhold(&self, id: &str) {
        self.held.lock().unwrap().remove(id);
    }

    pub fn read_count(&self, id: &str) -> usize {
        self.reads.lock().unwrap().iter().filter(|r| *r == id).count()
    }
}

#[async_trait]
impl ProfileRepository for FakeProfileRepository {
    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.reads.lock().unwrap().push(user_id.to_string());
        let snapshot = self.rows.lock().unwrap().get(user_id).cloned();
        let fail = self.fail_reads.load(Ordering::SeqCst);

        let held = self.held.lock().unwrap().get(user_id).cloned();
        if let Some(notify) = held {
            notify.notified().await;
        }

        if fail {
            return Err(AppError::Database("permission denied".to_string()));
        }
        Ok(snapshot)
    }

    async fn upsert_profile(&self, write: &ProfileWrite) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("insert violates policy".to_string()));
        }
        self.writes.lock().unwrap().push(write.clone());

        let held = self.held_writes.lock().unwrap().get(&write.id).cloned();
        if let Some(notify) = held {
            notify.notified().await;
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(write.id.clone()).or_insert_with(|| ProfileRow {
            id: write.id.clone(),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            user_purpose: None,
            profile_completed: None,
            created_at: Some(write.updated_at),
            updated_at: None,
        });
        row.first_name = Some(write.first_name.clone());
        row.last_name = Some(write.last_name.clone());
        row.phone = Some(write.phone.clone());
        row.user_purpose = write.user_purpose;
        row.updated_at = Some(write.updated_at);
        Ok(())
    }
}

// ─── Change feed ─────────────────────────────────────────────

#[derive(Default)]
pub struct ManualChangeFeed {
    listeners: Arc<Mutex<HashMap<usize, (String, ChangeListener)>>>,
    next_id: AtomicUsize,
    pub subscribed: AtomicUsize,
    pub disposed: Arc<AtomicUsize>,
}

impl ManualChangeFeed {
    /// Fire every listener watching `user_id`.
    pub fn notify(&self, user_id: &str) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .unwrap()
            .values()
            .filter(|(id, _)| id == user_id)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub fn active_for(&self, user_id: &str) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .values()
            .filter(|(id, _)| id == user_id)
            .count()
    }

    pub fn active(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl ChangeFeed for ManualChangeFeed {
    fn subscribe_profile(&self, user_id: &str, listener: ChangeListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap()
            .insert(id, (user_id.to_string(), listener));
        self.subscribed.fetch_add(1, Ordering::SeqCst);

        let listeners = self.listeners.clone();
        let disposed = self.disposed.clone();
        Subscription::new(move || {
            listeners.lock().unwrap().remove(&id);
            disposed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

// ─── Quiz repository ─────────────────────────────────────────

#[derive(Default)]
pub struct FakeQuizRepository {
    quizzes: Mutex<HashMap<String, QuizContent>>,
    pub submissions: Mutex<Vec<SubmissionRecord>>,
}

impl FakeQuizRepository {
    pub fn with_quiz(self, content: QuizContent) -> Self {
        self.quizzes
            .lock()
            .unwrap()
            .insert(content.quiz.id.clone(), content);
        self
    }
}

#[async_trait]
impl QuizRepository for FakeQuizRepository {
    async fn load_quiz(&self, quiz_id: &str) -> Result<Option<QuizContent>> {
        Ok(self.quizzes.lock().unwrap().get(quiz_id).cloned())
    }

    async fn record_submission(&self, record: &SubmissionRecord) -> Result<String> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(record.clone());
        Ok(format!("submission-{}", submissions.len()))
    }
}
