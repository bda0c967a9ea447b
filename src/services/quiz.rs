// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Quiz taking: load content, grade an attempt and record it.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::QuizRepository;
use crate::error::{AppError, Result};
use crate::models::quiz::{score, QuizContent, QuizResult, SubmissionRecord};
use crate::state::AuthState;

/// Quiz service bound to the signed-in user.
#[derive(Clone)]
pub struct QuizService {
    auth: AuthState,
    repo: Arc<dyn QuizRepository>,
}

impl QuizService {
    pub fn new(auth: AuthState, repo: Arc<dyn QuizRepository>) -> Self {
        Self { auth, repo }
    }

    /// Quiz with its ordered questions and options.
    pub async fn load(&self, quiz_id: &str) -> Result<QuizContent> {
        self.repo
            .load_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {}", quiz_id)))
    }

    /// Grade `answers` (question ID → option ID) and store the attempt.
    pub async fn submit(
        &self,
        quiz_id: &str,
        answers: &HashMap<String, String>,
    ) -> Result<QuizResult> {
        let user = self.auth.user().ok_or(AppError::Unauthenticated)?;
        let content = self.load(quiz_id).await?;

        let (result, graded) = score(&content, answers);
        let record = SubmissionRecord {
            quiz_id: content.quiz.id.clone(),
            user_id: user.id.clone(),
            result: result.clone(),
            answers: graded,
            submitted_at: Utc::now(),
        };

        let submission_id = self.repo.record_submission(&record).await?;
        tracing::info!(
            user_id = %user.id,
            quiz_id,
            submission_id = %submission_id,
            score = result.score_percent,
            passed = result.passed,
            "Quiz submitted"
        );
        Ok(result)
    }
}
