use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Length of an entity id: a uuid in simple (dashless) hex form.
const ID_LEN: usize = 32;

/// Opaque identifier for users, folders, tags, and notes.
///
/// Always 32 lowercase hex characters. Malformed ids are rejected by
/// [`EntityId::parse`] before any store access happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Validate a raw string as a well-formed id.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let well_formed = raw.len() == ID_LEN
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::validation("the id is not valid", Some("id")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
