//! Identity claims of an authenticated caller.
//!
//! Claims arrive already verified by the gateway; this module only reads
//! them.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Verified token claims as a JSON object.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(serde_json::Map<String, serde_json::Value>);

impl From<serde_json::Map<String, serde_json::Value>> for Claims {
    fn from(claims: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(claims)
    }
}

impl Claims {
    fn text(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// The `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.text("sub")
    }

    /// The `sub` claim, or [`Error::Unauthenticated`] without one.
    pub fn require_subject(&self) -> Result<&str> {
        self.subject().ok_or(Error::Unauthenticated)
    }

    /// `cognito:username`, falling back to `username`.
    pub fn username(&self) -> Option<&str> {
        self.text("cognito:username")
            .or_else(|| self.text("username"))
    }

    /// The `email` claim.
    pub fn email(&self) -> Option<&str> {
        self.text("email")
    }

    /// Group memberships from `cognito:groups`.
    ///
    /// The claim may be a JSON list, a string holding a JSON list, or a comma
    /// separated string.
    pub fn groups(&self) -> Vec<String> {
        match self.0.get("cognito:groups") {
            Some(serde_json::Value::Array(groups)) => groups.iter().map(group_name).collect(),
            Some(serde_json::Value::String(raw)) => parse_groups(raw),
            _ => Vec::new(),
        }
    }

    /// Whether the caller belongs to the `admin` group, in any letter case.
    pub fn is_admin(&self) -> bool {
        self.groups()
            .iter()
            .any(|group| group.eq_ignore_ascii_case("admin"))
    }
}

fn group_name(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(name) => name.clone(),
        other => other.to_string(),
    }
}

fn split_groups(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_groups(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        return split_groups(raw);
    };
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(groups)) => groups.iter().map(group_name).collect(),
        Ok(other) => vec![group_name(&other)],
        Err(_) => split_groups(inner),
    }
}
