use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};

use crate::{
    hash_password, search, verify_password, EntityId, Error, Folder, NewUser, Note, NoteDetail,
    NoteInput, NoteQuery, Session, Store, Tag, User, UserProfile,
};

const PASSWORD_MIN_CHARS: usize = 8;
// bcrypt-era limit, kept so long passphrases fail loudly instead of silently truncating
const PASSWORD_MAX_CHARS: usize = 72;

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

/// The main service that contains all business logic.
/// Generic over the storage implementation.
///
/// Every operation below the authentication boundary takes the verified
/// owner id as an explicit first parameter; nothing is pulled from ambient
/// request state, so the service can be tested against a bare store.
pub struct QuillService<S: Store> {
    store: S,
    token_ttl: Duration,
}

impl<S: Store> QuillService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    /// Override the bearer token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    // --- identity & authentication ---

    /// Create an account. The password is stored only as a one-way hash.
    pub async fn register(&self, new_user: NewUser) -> Result<UserProfile, Error> {
        let username = require_field(new_user.username, "username")?;
        let password = require_field(new_user.password, "password")?;

        for (value, location) in [(&username, "username"), (&password, "password")] {
            if value.trim() != value.as_str() {
                return Err(Error::validation(
                    "cannot start or end with whitespace",
                    Some(location),
                ));
            }
        }

        if username.is_empty() {
            return Err(Error::validation(
                "must be at least 1 character long",
                Some("username"),
            ));
        }
        let password_chars = password.chars().count();
        if password_chars < PASSWORD_MIN_CHARS {
            return Err(Error::validation(
                format!("must be at least {PASSWORD_MIN_CHARS} characters long"),
                Some("password"),
            ));
        }
        if password_chars > PASSWORD_MAX_CHARS {
            return Err(Error::validation(
                format!("must be at most {PASSWORD_MAX_CHARS} characters long"),
                Some("password"),
            ));
        }

        let full_name = new_user
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let user = User {
            id: EntityId::generate(),
            username,
            full_name,
            password_hash: hash_password(&password)?,
        };

        // Uniqueness is enforced by the storage index; a concurrent
        // duplicate loses the race there and still comes back as Conflict.
        let user = self.store.insert_user(user).await?;
        Ok(user.profile())
    }

    /// Verify a username/password pair and return the account.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, Error> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| Error::Authentication("incorrect username".into()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(Error::Authentication("incorrect password".into()));
        }
        Ok(user)
    }

    /// Issue a bearer token for a verified account.
    pub async fn issue_token(&self, user: &User) -> Result<Session, Error> {
        let session = Session {
            token: format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            ),
            user_id: user.id.clone(),
            expires_at: Utc::now() + self.token_ttl,
        };
        self.store.insert_session(session.clone()).await?;
        Ok(session)
    }

    /// Resolve a bearer token to its owner. Expired sessions are removed
    /// on sight.
    pub async fn verify_token(&self, token: &str) -> Result<EntityId, Error> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or_else(|| Error::Authentication("invalid token".into()))?;

        if session.expires_at <= Utc::now() {
            self.store.delete_session(token).await?;
            return Err(Error::TokenExpired);
        }
        Ok(session.user_id)
    }

    /// The authenticated user's own profile.
    pub async fn profile(&self, owner: &EntityId) -> Result<UserProfile, Error> {
        let user = self
            .store
            .get_user(owner)
            .await?
            .ok_or(Error::NotFound("user"))?;
        Ok(user.profile())
    }

    // --- folders ---

    pub async fn list_folders(&self, owner: &EntityId) -> Result<Vec<Folder>, Error> {
        self.store.list_folders(owner).await
    }

    pub async fn get_folder(&self, owner: &EntityId, id: &str) -> Result<Folder, Error> {
        let id = EntityId::parse(id)?;
        self.store
            .get_folder(owner, &id)
            .await?
            .ok_or(Error::NotFound("folder"))
    }

    pub async fn create_folder(&self, owner: &EntityId, name: &str) -> Result<Folder, Error> {
        let name = require_name(name)?;
        self.store
            .insert_folder(Folder {
                id: EntityId::generate(),
                name,
                owner_id: owner.clone(),
            })
            .await
    }

    pub async fn rename_folder(
        &self,
        owner: &EntityId,
        id: &str,
        name: &str,
    ) -> Result<Folder, Error> {
        let id = EntityId::parse(id)?;
        let name = require_name(name)?;
        self.store
            .rename_folder(owner, &id, &name)
            .await?
            .ok_or(Error::NotFound("folder"))
    }

    /// Delete a folder; every note of this owner referencing it has its
    /// folder cleared in the same storage transaction.
    pub async fn delete_folder(&self, owner: &EntityId, id: &str) -> Result<(), Error> {
        let id = EntityId::parse(id)?;
        if self.store.delete_folder(owner, &id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("folder"))
        }
    }

    // --- tags ---

    pub async fn list_tags(&self, owner: &EntityId) -> Result<Vec<Tag>, Error> {
        self.store.list_tags(owner).await
    }

    pub async fn get_tag(&self, owner: &EntityId, id: &str) -> Result<Tag, Error> {
        let id = EntityId::parse(id)?;
        self.store
            .get_tag(owner, &id)
            .await?
            .ok_or(Error::NotFound("tag"))
    }

    pub async fn create_tag(&self, owner: &EntityId, name: &str) -> Result<Tag, Error> {
        let name = require_name(name)?;
        self.store
            .insert_tag(Tag {
                id: EntityId::generate(),
                name,
                owner_id: owner.clone(),
            })
            .await
    }

    pub async fn rename_tag(&self, owner: &EntityId, id: &str, name: &str) -> Result<Tag, Error> {
        let id = EntityId::parse(id)?;
        let name = require_name(name)?;
        self.store
            .rename_tag(owner, &id, &name)
            .await?
            .ok_or(Error::NotFound("tag"))
    }

    /// Delete a tag; its id is pulled from the tag set of every note of
    /// this owner in the same storage transaction.
    pub async fn delete_tag(&self, owner: &EntityId, id: &str) -> Result<(), Error> {
        let id = EntityId::parse(id)?;
        if self.store.delete_tag(owner, &id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("tag"))
        }
    }

    // --- notes ---

    /// List notes with optional folder filter and relevance-ranked search.
    ///
    /// Without a search term, results come back newest first. With one,
    /// non-matching notes are dropped and the rest are ordered by score,
    /// newest first among equals.
    pub async fn list_notes(
        &self,
        owner: &EntityId,
        query: NoteQuery,
    ) -> Result<Vec<NoteDetail>, Error> {
        let folder_filter = match query.folder_id.as_deref().filter(|v| !v.is_empty()) {
            Some(raw) => Some(EntityId::parse(raw)?),
            None => None,
        };

        let notes = self.store.list_notes(owner, folder_filter.as_ref()).await?;
        let details = self.populate(owner, notes).await?;

        let terms = query
            .search_term
            .as_deref()
            .map(search::tokenize)
            .unwrap_or_default();
        if terms.is_empty() {
            return Ok(details);
        }

        let mut scored: Vec<(f64, NoteDetail)> = details
            .into_iter()
            .filter_map(|detail| {
                let score = search::relevance(&terms, &detail.title, &detail.content);
                (score > 0.0).then_some((score, detail))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.created_at.cmp(&a.1.created_at))
        });
        Ok(scored.into_iter().map(|(_, detail)| detail).collect())
    }

    pub async fn get_note(&self, owner: &EntityId, id: &str) -> Result<NoteDetail, Error> {
        let id = EntityId::parse(id)?;
        let note = self
            .store
            .get_note(owner, &id)
            .await?
            .ok_or(Error::NotFound("note"))?;
        self.populate_one(owner, note).await
    }

    pub async fn create_note(
        &self,
        owner: &EntityId,
        input: NoteInput,
    ) -> Result<NoteDetail, Error> {
        let (title, content, folder_id, tags) = self.validate_note_input(owner, input).await?;
        let note = Note {
            id: EntityId::generate(),
            title,
            content,
            created_at: Utc::now(),
            owner_id: owner.clone(),
            folder_id,
            tags,
        };
        let note = self.store.insert_note(note).await?;
        self.populate_one(owner, note).await
    }

    /// Full replace of title, content, folder, and tags.
    pub async fn update_note(
        &self,
        owner: &EntityId,
        id: &str,
        input: NoteInput,
    ) -> Result<NoteDetail, Error> {
        let id = EntityId::parse(id)?;
        let (title, content, folder_id, tags) = self.validate_note_input(owner, input).await?;

        let existing = self
            .store
            .get_note(owner, &id)
            .await?
            .ok_or(Error::NotFound("note"))?;
        // The lookup above is already owner-scoped; this guards the
        // invariant against a store that stops filtering.
        if existing.owner_id != *owner {
            return Err(Error::Forbidden("note belongs to another user"));
        }

        let note = Note {
            id,
            title,
            content,
            created_at: Utc::now(),
            owner_id: owner.clone(),
            folder_id,
            tags,
        };
        let note = self
            .store
            .update_note(note)
            .await?
            .ok_or(Error::NotFound("note"))?;
        self.populate_one(owner, note).await
    }

    pub async fn delete_note(&self, owner: &EntityId, id: &str) -> Result<(), Error> {
        let id = EntityId::parse(id)?;
        if self.store.delete_note(owner, &id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("note"))
        }
    }

    // --- projection ---

    /// Resolve folder and tag references into full records. Lookup maps
    /// are owner-scoped, so a reference can only resolve to the owner's
    /// own folders and tags.
    async fn populate(
        &self,
        owner: &EntityId,
        notes: Vec<Note>,
    ) -> Result<Vec<NoteDetail>, Error> {
        let folders: HashMap<EntityId, Folder> = self
            .store
            .list_folders(owner)
            .await?
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();
        let tags: HashMap<EntityId, Tag> = self
            .store
            .list_tags(owner)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        Ok(notes
            .into_iter()
            .map(|note| {
                let folder = note.folder_id.as_ref().and_then(|id| folders.get(id)).cloned();
                let mut resolved: Vec<Tag> = note
                    .tags
                    .iter()
                    .filter_map(|id| tags.get(id))
                    .cloned()
                    .collect();
                resolved.sort_by(|a, b| a.name.cmp(&b.name));
                NoteDetail {
                    id: note.id,
                    title: note.title,
                    content: note.content,
                    created_at: note.created_at,
                    owner_id: note.owner_id,
                    folder,
                    tags: resolved,
                }
            })
            .collect())
    }

    async fn populate_one(&self, owner: &EntityId, note: Note) -> Result<NoteDetail, Error> {
        self.populate(owner, vec![note])
            .await?
            .pop()
            .ok_or_else(|| Error::Internal("projection dropped a note".into()))
    }

    /// Validate note fields and check that folder/tag references resolve
    /// to records owned by the caller. Tag ids are deduplicated.
    async fn validate_note_input(
        &self,
        owner: &EntityId,
        input: NoteInput,
    ) -> Result<(String, String, Option<EntityId>, Vec<EntityId>), Error> {
        let title = input.title.unwrap_or_default();
        if title.trim().is_empty() {
            return Err(Error::validation(
                "missing title in request body",
                Some("title"),
            ));
        }
        let content = input.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(Error::validation(
                "missing content in request body",
                Some("content"),
            ));
        }

        let folder_id = match input.folder_id.as_deref().filter(|v| !v.is_empty()) {
            Some(raw) => {
                let id = EntityId::parse(raw)
                    .map_err(|_| Error::validation("invalid folder id", Some("folderId")))?;
                if self.store.get_folder(owner, &id).await?.is_none() {
                    return Err(Error::validation("invalid folder id", Some("folderId")));
                }
                Some(id)
            }
            None => None,
        };

        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for raw in &input.tags {
            let id = EntityId::parse(raw)
                .map_err(|_| Error::validation("invalid tag id", Some("tags")))?;
            if self.store.get_tag(owner, &id).await?.is_none() {
                return Err(Error::validation("invalid tag id", Some("tags")));
            }
            if seen.insert(id.clone()) {
                tags.push(id);
            }
        }

        Ok((title, content, folder_id, tags))
    }
}

fn require_field(value: Option<String>, location: &str) -> Result<String, Error> {
    value.ok_or_else(|| Error::validation("missing field", Some(location)))
}

fn require_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(
            "missing name in request body",
            Some("name"),
        ));
    }
    Ok(name.to_string())
}
