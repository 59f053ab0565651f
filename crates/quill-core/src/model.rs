use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A registered account as stored. The password hash never leaves the
/// backend; serialize [`UserProfile`] instead.
#[derive(Debug, Clone)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}

impl User {
    /// The public representation, with the password hash stripped.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }
}

/// A user as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: EntityId,
    pub username: String,
    pub full_name: Option<String>,
}

/// Fields accepted at registration.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

/// A bearer token with its owning user and expiry.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: EntityId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: EntityId,
    pub name: String,
    pub owner_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: EntityId,
    pub name: String,
    pub owner_id: EntityId,
}

/// A note as stored: folder and tags are held by reference.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: EntityId,
    pub folder_id: Option<EntityId>,
    pub tags: Vec<EntityId>,
}

/// A note with its folder and tag references resolved into full records.
/// This is the projection every read operation returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDetail {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: EntityId,
    pub folder: Option<Folder>,
    pub tags: Vec<Tag>,
}

/// Fields accepted when creating or replacing a note.
///
/// Ids arrive as raw strings from the wire and are validated by the
/// service before any store access.
#[derive(Debug, Clone, Default)]
pub struct NoteInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
}

/// Filters for listing notes.
#[derive(Debug, Clone, Default)]
pub struct NoteQuery {
    pub search_term: Option<String>,
    pub folder_id: Option<String>,
}
