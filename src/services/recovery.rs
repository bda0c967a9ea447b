//! Parsing of password-recovery redirect links.
//!
//! The reset email sends the user to `/reset-password` with the session
//! tokens in the URL fragment, e.g.
//! `https://app/reset-password#access_token=..&refresh_token=..&type=recovery`.
//! Expired links carry `error_description` instead.

use crate::error::{AppError, Result};

/// Tokens extracted from a recovery redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryLink {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for RecoveryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecoveryLink(<redacted>)")
    }
}

impl RecoveryLink {
    pub fn parse(url: &str) -> Result<Self> {
        // Tokens normally live in the fragment; some mail clients move them to the query
        let params = url
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .or_else(|| url.split_once('?').map(|(_, query)| query))
            .ok_or_else(|| AppError::Validation("Recovery link has no parameters".to_string()))?;

        let mut access_token = None;
        let mut refresh_token = None;
        let mut link_type = None;

        for pair in params.split('&') {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(raw)?;
            match key {
                "access_token" => access_token = Some(value),
                "refresh_token" => refresh_token = Some(value),
                "type" => link_type = Some(value),
                "error_description" => return Err(AppError::Auth(value)),
                _ => {}
            }
        }

        if let Some(kind) = link_type.as_deref() {
            if kind != "recovery" {
                return Err(AppError::Validation(format!(
                    "Expected a password recovery link, got {:?}",
                    kind
                )));
            }
        }

        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token))
                if !access_token.is_empty() && !refresh_token.is_empty() =>
            {
                Ok(Self {
                    access_token,
                    refresh_token,
                })
            }
            _ => Err(AppError::Validation(
                "Recovery link is missing its session tokens".to_string(),
            )),
        }
    }
}

/// Form-style decoding: `+` is a space, then percent escapes.
fn decode_component(raw: &str) -> Result<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|e| AppError::Validation(format!("Malformed recovery link: {}", e)))
}
