// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - hosted backend clients and business logic.

pub mod hosted_auth;
pub mod quiz;
pub mod recovery;
pub mod session;
pub mod subscription;

pub use hosted_auth::HostedAuthClient;
pub use quiz::QuizService;
pub use recovery::RecoveryLink;
pub use session::{
    AuthChange, AuthEvent, AuthListener, BearerSource, Credentials, NewPassword, SessionStore,
    SignUpData,
};
pub use subscription::{ListenerSet, Subscription};
