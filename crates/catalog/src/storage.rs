use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_core::{DomainError, DomainResult, Entity, SoftDeletable, StorageId};

use crate::slug::slugify;

/// Maximum length of a storage code.
pub const STORAGE_CODE_MAX_LEN: usize = 64;

/// A physical or logical location holding stock (warehouse, shelf, store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub id: StorageId,
    pub name: String,
    /// Unique, uppercase code (e.g. `ACME_NORTH_STORAGE`).
    pub code: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Storage {
    type Id = StorageId;

    fn id(&self) -> StorageId {
        self.id
    }
}

impl SoftDeletable for Storage {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Derive a storage code from its display name: "Acme North" -> "ACME_NORTH".
pub fn storage_code_from_name(name: &str) -> String {
    slugify(name, '_').to_ascii_uppercase()
}

/// Input for creating a storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStorage {
    pub name: String,
    /// Derived from `name` when absent.
    pub code: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub metadata: Option<JsonValue>,
}

impl NewStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            description: None,
            location: None,
            is_active: true,
            metadata: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Normalize and validate: trimmed name, derived uppercase code, object metadata.
    pub fn validate(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("storage name cannot be empty"));
        }

        let code = match self.code {
            Some(c) => storage_code_from_name(&c),
            None => storage_code_from_name(&name),
        };
        if code.is_empty() {
            return Err(DomainError::validation(format!(
                "storage code derived from '{name}' is empty"
            )));
        }
        if code.len() > STORAGE_CODE_MAX_LEN {
            return Err(DomainError::validation(format!(
                "storage code longer than {STORAGE_CODE_MAX_LEN} characters"
            )));
        }

        if let Some(meta) = &self.metadata {
            if !meta.is_object() {
                return Err(DomainError::validation("storage metadata must be a JSON object"));
            }
        }

        Ok(Self {
            name,
            code: Some(code),
            description: non_blank(self.description),
            location: non_blank(self.location),
            is_active: self.is_active,
            metadata: self.metadata,
        })
    }

    /// Code after validation (empty before `validate`).
    pub fn code_or_empty(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_is_uppercase_underscore_slug() {
        assert_eq!(storage_code_from_name("Acme North Storage"), "ACME_NORTH_STORAGE");
        assert_eq!(storage_code_from_name("Smith, Jones & Co. Storage"), "SMITH_JONES_CO_STORAGE");
    }

    #[test]
    fn validate_derives_code_and_drops_blank_optionals() {
        let s = NewStorage::new(" Main Warehouse ")
            .with_location("   ")
            .validate()
            .unwrap();
        assert_eq!(s.name, "Main Warehouse");
        assert_eq!(s.code_or_empty(), "MAIN_WAREHOUSE");
        assert_eq!(s.location, None);
    }

    #[test]
    fn explicit_code_is_normalized() {
        let s = NewStorage::new("Main").with_code("wh-01").validate().unwrap();
        assert_eq!(s.code_or_empty(), "WH_01");
    }

    #[test]
    fn rejects_non_object_metadata() {
        let err = NewStorage::new("Main")
            .with_metadata(json!(["contact"]))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("metadata")));
    }

    #[test]
    fn accepts_object_metadata() {
        let s = NewStorage::new("Main")
            .with_metadata(json!({"contact": "+1 555 0100"}))
            .validate()
            .unwrap();
        assert_eq!(s.metadata, Some(json!({"contact": "+1 555 0100"})));
    }
}
