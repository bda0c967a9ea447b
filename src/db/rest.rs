// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted REST table client with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (read by ID, upsert, change polling)
//! - Quizzes (content, submissions, answers)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::{tables, ChangeFeed, ChangeListener, ProfileRepository, QuizRepository};
use crate::error::{AppError, Result};
use crate::models::quiz::{Quiz, QuizOption, QuizQuestion};
use crate::models::{ProfileRow, ProfileWrite, QuizContent, SubmissionRecord};
use crate::services::session::BearerSource;
use crate::services::subscription::Subscription;

/// REST database client.
#[derive(Clone)]
pub struct RestDb {
    client: Option<Arc<RestClient>>,
}

struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bearer: Arc<dyn BearerSource>,
    poll_interval: Duration,
}

impl RestDb {
    /// Create a client authorising as the signed-in user via `bearer`.
    pub fn new(config: &Config, bearer: Arc<dyn BearerSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        tracing::info!(url = %config.rest_api_url(), "REST database client ready");

        Ok(Self {
            client: Some(Arc::new(RestClient {
                http,
                base_url: config.rest_api_url(),
                anon_key: config.anon_key.clone(),
                bearer,
                poll_interval: config.profile_poll_interval,
            })),
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&Arc<RestClient>> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

impl RestClient {
    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let bearer = self.bearer.access_token().await;
        self.http
            .request(method, self.url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.as_deref().unwrap_or(&self.anon_key))
    }

    /// GET rows matching PostgREST `filters`.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .await
            .query(filters)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        check_response_json(table, response).await
    }

    /// POST `body`; `prefer` selects upsert/return behaviour.
    async fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &[(&str, &str)],
        prefer: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .request(reqwest::Method::POST, table)
            .await
            .query(query)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(table, response).await)
        }
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

// ─── Profile Operations ──────────────────────────────────────

#[async_trait]
impl ProfileRepository for RestDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        let rows: Vec<ProfileRow> = self
            .get_client()?
            .select(
                tables::USER_PROFILES,
                &[("select", "*".to_string()), ("id", eq(user_id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, row: &ProfileWrite) -> Result<()> {
        self.get_client()?
            .insert(
                tables::USER_PROFILES,
                &[("on_conflict", "id")],
                "resolution=merge-duplicates,return=minimal",
                row,
            )
            .await?;
        tracing::debug!(user_id = %row.id, "Profile row upserted");
        Ok(())
    }
}

// ─── Change Polling ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RowVersion {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl ChangeFeed for RestDb {
    /// Poll the row's `updated_at`; any change after the first poll fires
    /// `listener`. A row appearing or disappearing counts as a change.
    fn subscribe_profile(&self, user_id: &str, listener: ChangeListener) -> Subscription {
        let client = match self.get_client() {
            Ok(client) => Arc::clone(client),
            Err(_) => {
                tracing::warn!(user_id, "Offline database, profile changes will not be observed");
                return Subscription::noop();
            }
        };
        let user_id = user_id.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(client.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_seen: Option<Option<Option<DateTime<Utc>>>> = None;

            loop {
                ticker.tick().await;
                let rows: Vec<RowVersion> = match client
                    .select(
                        tables::USER_PROFILES,
                        &[("select", "updated_at".to_string()), ("id", eq(&user_id))],
                    )
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::debug!(user_id = %user_id, error = %e, "Profile poll failed");
                        continue;
                    }
                };

                let version = rows.into_iter().next().map(|r| r.updated_at);
                match &last_seen {
                    Some(previous) if *previous != version => {
                        tracing::debug!(user_id = %user_id, "Profile row changed");
                        listener();
                    }
                    _ => {}
                }
                last_seen = Some(version);
            }
        });

        Subscription::new(move || handle.abort())
    }
}

// ─── Quiz Operations ─────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SubmissionInsert<'a> {
    quiz_id: &'a str,
    user_id: &'a str,
    score: u32,
    correct_count: u32,
    total_questions: u32,
    passed: bool,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct AnswerInsert<'a> {
    submission_id: &'a str,
    question_id: &'a str,
    selected_option_id: Option<&'a str>,
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
struct Inserted {
    id: String,
}

#[async_trait]
impl QuizRepository for RestDb {
    async fn load_quiz(&self, quiz_id: &str) -> Result<Option<QuizContent>> {
        let client = self.get_client()?;

        let (quizzes, questions) = futures_util::future::try_join(
            client.select::<Quiz>(
                tables::QUIZZES,
                &[("select", "*".to_string()), ("id", eq(quiz_id))],
            ),
            client.select::<QuizQuestion>(
                tables::QUIZ_QUESTIONS,
                &[
                    ("select", "*".to_string()),
                    ("quiz_id", eq(quiz_id)),
                    ("order", "order_index.asc".to_string()),
                ],
            ),
        )
        .await?;

        let Some(quiz) = quizzes.into_iter().next() else {
            return Ok(None);
        };

        let options = if questions.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
            client
                .select::<QuizOption>(
                    tables::QUIZ_OPTIONS,
                    &[
                        ("select", "*".to_string()),
                        ("question_id", format!("in.({})", ids.join(","))),
                    ],
                )
                .await?
        };

        Ok(Some(QuizContent {
            quiz,
            questions,
            options,
        }))
    }

    async fn record_submission(&self, record: &SubmissionRecord) -> Result<String> {
        let client = self.get_client()?;

        let response = client
            .insert(
                tables::QUIZ_SUBMISSIONS,
                &[("select", "id")],
                "return=representation",
                &[SubmissionInsert {
                    quiz_id: &record.quiz_id,
                    user_id: &record.user_id,
                    score: record.result.score_percent,
                    correct_count: record.result.correct,
                    total_questions: record.result.total,
                    passed: record.result.passed,
                    submitted_at: record.submitted_at,
                }],
            )
            .await?;

        let inserted: Vec<Inserted> = response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)))?;
        let submission_id = inserted
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| AppError::Database("Submission insert returned no row".to_string()))?;

        if !record.answers.is_empty() {
            let answers: Vec<AnswerInsert<'_>> = record
                .answers
                .iter()
                .map(|a| AnswerInsert {
                    submission_id: &submission_id,
                    question_id: &a.question_id,
                    selected_option_id: a.selected_option_id.as_deref(),
                    is_correct: a.is_correct,
                })
                .collect();
            client
                .insert(tables::QUIZ_ANSWERS, &[], "return=minimal", &answers)
                .await?;
        }

        Ok(submission_id)
    }
}

// ─── Response handling ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    message: Option<String>,
}

async fn error_from_response(table: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RestErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    AppError::Database(format!("{} ({}): {}", table, status, message))
}

async fn check_response_json<T: DeserializeOwned>(
    table: &str,
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(table, response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Database(format!("{}: JSON parse error: {}", table, e)))
}
