// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training quizzes: content, answers and scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Minimum score (percent) required to pass a quiz.
pub const PASSING_SCORE_PERCENT: u32 = 70;

/// Row in the `quizzes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Row in the `quiz_questions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub quiz_id: String,
    pub question_text: String,
    #[serde(default)]
    pub order_index: i32,
}

/// Row in the `quiz_options` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub question_id: String,
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// A quiz with its questions (ordered) and every question's options.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizContent {
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestion>,
    pub options: Vec<QuizOption>,
}

impl QuizContent {
    /// Options belonging to one question, in stored order.
    pub fn options_for<'a>(&'a self, question_id: &'a str) -> impl Iterator<Item = &'a QuizOption> {
        self.options
            .iter()
            .filter(move |o| o.question_id == question_id)
    }
}

/// Outcome of a scored attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct QuizResult {
    pub correct: u32,
    pub total: u32,
    pub score_percent: u32,
    pub passed: bool,
}

/// One graded answer, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub is_correct: bool,
}

/// Everything written for one attempt: the submission row and its answers.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub quiz_id: String,
    pub user_id: String,
    pub result: QuizResult,
    pub answers: Vec<GradedAnswer>,
    pub submitted_at: DateTime<Utc>,
}

/// Grade `answers` (question ID → selected option ID) against `content`.
///
/// Unanswered questions and options that do not belong to the question
/// count as wrong. A quiz with no questions scores 0 and does not pass.
pub fn score(content: &QuizContent, answers: &HashMap<String, String>) -> (QuizResult, Vec<GradedAnswer>) {
    let graded: Vec<GradedAnswer> = content
        .questions
        .iter()
        .map(|question| {
            let selected = answers.get(&question.id).cloned();
            let is_correct = selected.as_deref().is_some_and(|option_id| {
                content
                    .options_for(&question.id)
                    .any(|o| o.id == option_id && o.is_correct)
            });
            GradedAnswer {
                question_id: question.id.clone(),
                selected_option_id: selected,
                is_correct,
            }
        })
        .collect();

    let total = graded.len() as u32;
    let correct = graded.iter().filter(|a| a.is_correct).count() as u32;
    let score_percent = if total == 0 {
        0
    } else {
        ((f64::from(correct) / f64::from(total)) * 100.0).round() as u32
    };

    let result = QuizResult {
        correct,
        total,
        score_percent,
        passed: total > 0 && score_percent >= PASSING_SCORE_PERCENT,
    };
    (result, graded)
}
