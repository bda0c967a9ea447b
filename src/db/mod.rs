//! Data layer: repository ports and the hosted REST implementation.

pub mod rest;

pub use rest::RestDb;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ProfileRow, ProfileWrite, QuizContent, SubmissionRecord};
use crate::services::subscription::Subscription;

/// Table names as constants.
pub mod tables {
    pub const USER_PROFILES: &str = "user_profiles";
    pub const QUIZZES: &str = "quizzes";
    pub const QUIZ_QUESTIONS: &str = "quiz_questions";
    pub const QUIZ_OPTIONS: &str = "quiz_options";
    pub const QUIZ_SUBMISSIONS: &str = "quiz_submissions";
    pub const QUIZ_ANSWERS: &str = "quiz_answers";
}

/// Per-user profile rows.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>>;

    /// Insert the row if absent, update it if present.
    async fn upsert_profile(&self, row: &ProfileWrite) -> Result<()>;
}

/// Callback fired when a watched row changes.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Row-level change notifications.
pub trait ChangeFeed: Send + Sync {
    /// Watch the profile row of `user_id` until the subscription is disposed.
    fn subscribe_profile(&self, user_id: &str, listener: ChangeListener) -> Subscription;
}

/// Quiz content and attempt storage.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn load_quiz(&self, quiz_id: &str) -> Result<Option<QuizContent>>;

    /// Store an attempt and its answers, returning the submission ID.
    async fn record_submission(&self, record: &SubmissionRecord) -> Result<String>;
}
