// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod profile;
pub mod quiz;
pub mod user;

pub use profile::{is_profile_complete, Profile, ProfileRow, ProfileWrite, UserPurpose};
pub use quiz::{QuizContent, QuizResult, SubmissionRecord};
pub use user::{Session, User};
