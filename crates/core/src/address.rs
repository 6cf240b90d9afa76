//! Individual email address rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of address: `test` rows receive preview sends only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Normal,
    Test,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Test => "test",
        }
    }
}

impl Default for AddressType {
    fn default() -> Self {
        Self::Normal
    }
}

/// Row from the `email_addresses` table.
///
/// `email` is stored case-preserving; uniqueness within a group is enforced
/// on `lower(email)` by the store. Rows are only ever created by the
/// ingestion worker's batch insert.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailAddress {
    pub id: Uuid,
    pub address_group_id: Uuid,
    pub email: String,
    pub name: String,
    pub address_type: String,
    pub is_subscribed: bool,
    pub memo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_type_serde() {
        assert_eq!(serde_json::to_string(&AddressType::Normal).unwrap(), "\"normal\"");
        assert_eq!(serde_json::to_string(&AddressType::Test).unwrap(), "\"test\"");
        let parsed: AddressType = serde_json::from_str("\"test\"").unwrap();
        assert_eq!(parsed, AddressType::Test);
    }

    #[test]
    fn test_address_type_default() {
        assert_eq!(AddressType::default(), AddressType::Normal);
        assert_eq!(AddressType::default().as_str(), "normal");
    }
}
