// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile: the row stored in `user_profiles` and the client-side shape.
//!
//! Only a subset of the client shape has backing columns. The rest
//! (address, emergency contact, notification preferences) lives in memory
//! and falls back to fixed defaults on every load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Why the user signed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub enum UserPurpose {
    CareerHelp,
    Patient,
}

/// Profile as held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct Profile {
    /// Same as the auth user ID
    pub id: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub phone: String,
    pub address: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    pub user_purpose: Option<UserPurpose>,
    pub notifications: bool,
    pub email_updates: bool,
}

impl Profile {
    /// Empty profile for a user who has not filled in the form yet.
    pub fn blank(user_id: &str, email: Option<&str>) -> Self {
        Self {
            id: user_id.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: email.unwrap_or_default().to_string(),
            phone: String::new(),
            address: String::new(),
            emergency_contact: String::new(),
            emergency_phone: String::new(),
            user_purpose: None,
            notifications: true,
            email_updates: true,
        }
    }

    /// Map a stored row onto the client shape.
    ///
    /// Fields without a column take their fixed defaults. A null `email`
    /// column falls back to the address the user authenticated with.
    pub fn from_row(row: &ProfileRow, auth_email: Option<&str>) -> Self {
        let email = row
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .or(auth_email)
            .unwrap_or_default();

        Self {
            first_name: row.first_name.clone().unwrap_or_default(),
            last_name: row.last_name.clone().unwrap_or_default(),
            phone: row.phone.clone().unwrap_or_default(),
            user_purpose: row.user_purpose,
            ..Self::blank(&row.id, Some(email))
        }
    }

    /// Gate for the main app: names, email and purpose must all be present.
    pub fn is_complete(&self) -> bool {
        !self.first_name.is_empty()
            && !self.last_name.is_empty()
            && !self.email.is_empty()
            && self.user_purpose.is_some()
    }

    /// The persisted subset of this profile.
    pub fn to_write(&self, updated_at: DateTime<Utc>) -> ProfileWrite {
        ProfileWrite {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            user_purpose: self.user_purpose,
            updated_at,
        }
    }
}

/// `is_complete` on an optional profile; a missing profile is incomplete.
pub fn is_profile_complete(profile: Option<&Profile>) -> bool {
    profile.is_some_and(Profile::is_complete)
}

/// Row in the `user_profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_purpose: Option<UserPurpose>,
    /// Written by backend tooling; never trusted by the client
    #[serde(default)]
    pub profile_completed: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Columns written by `update_profile`. Inserted if absent, updated if present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileWrite {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub user_purpose: Option<UserPurpose>,
    pub updated_at: DateTime<Utc>,
}
