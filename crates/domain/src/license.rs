//! License key entity and import helpers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{LicenseKeyId, OrderRowId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle of a single key. `Unassigned → Assigned` happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseKeyState {
    Unassigned,
    Assigned,
}

impl LicenseKeyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseKeyState::Unassigned => "UNASSIGNED",
            LicenseKeyState::Assigned => "ASSIGNED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "UNASSIGNED" => Ok(LicenseKeyState::Unassigned),
            "ASSIGNED" => Ok(LicenseKeyState::Assigned),
            other => Err(DomainError::UnknownState {
                kind: "license key",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LicenseKeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sellable key of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseKey {
    pub id: LicenseKeyId,
    pub product_id: ProductId,
    pub secret: String,
    pub state: LicenseKeyState,
    pub order_id: Option<OrderRowId>,
    pub created_at: DateTime<Utc>,
}

impl LicenseKey {
    pub fn is_assigned(&self) -> bool {
        self.state == LicenseKeyState::Assigned
    }
}

/// Splits a pasted, newline-separated key list.
pub fn split_secret_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Trims secrets, drops blanks and removes repeats while keeping the first
/// occurrence's position.
pub fn normalize_secrets<I, S>(secrets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    secrets
        .into_iter()
        .filter_map(|s| {
            let trimmed = s.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_string())).then(|| trimmed.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_blanks_and_repeats() {
        let secrets = normalize_secrets(["k1", " k1 ", "", "k2", "   "]);
        assert_eq!(secrets, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn test_split_handles_crlf() {
        let lines = split_secret_lines("AAA\r\nBBB\n\nCCC");
        assert_eq!(normalize_secrets(lines), vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn test_state_round_trips_through_storage_name() {
        assert_eq!(
            LicenseKeyState::parse("ASSIGNED").unwrap(),
            LicenseKeyState::Assigned
        );
        assert_eq!(LicenseKeyState::Unassigned.as_str(), "UNASSIGNED");
        assert!(LicenseKeyState::parse("USED").is_err());
    }
}
