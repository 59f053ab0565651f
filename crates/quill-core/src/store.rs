use crate::{EntityId, Error, Folder, Note, Session, Tag, User};

/// Storage abstraction implemented by the SQLite backend.
///
/// Every folder, tag, and note method takes the owner id as an explicit
/// first parameter; lookups are owner-scoped, so an id belonging to another
/// owner is indistinguishable from a nonexistent one. Uniqueness violations
/// are translated into [`Error::Conflict`] at this boundary, never surfaced
/// as raw storage errors.
#[async_trait::async_trait]
pub trait Store {
    // --- users ---

    /// Insert a user. Duplicate username -> `Conflict` at `username`.
    async fn insert_user(&self, user: User) -> Result<User, Error>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error>;

    async fn get_user(&self, id: &EntityId) -> Result<Option<User>, Error>;

    // --- sessions ---

    async fn insert_session(&self, session: Session) -> Result<(), Error>;

    async fn find_session(&self, token: &str) -> Result<Option<Session>, Error>;

    /// Delete a session. Returns true if one existed.
    async fn delete_session(&self, token: &str) -> Result<bool, Error>;

    // --- folders ---

    /// All folders of the owner, ordered by name ascending.
    async fn list_folders(&self, owner: &EntityId) -> Result<Vec<Folder>, Error>;

    async fn get_folder(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Folder>, Error>;

    /// Insert a folder. Duplicate (owner, name) -> `Conflict` at `name`.
    async fn insert_folder(&self, folder: Folder) -> Result<Folder, Error>;

    /// Rename a folder. Returns None if no such folder for this owner.
    async fn rename_folder(
        &self,
        owner: &EntityId,
        id: &EntityId,
        name: &str,
    ) -> Result<Option<Folder>, Error>;

    /// Delete a folder and clear `folder_id` on every note of the same
    /// owner referencing it, atomically. Returns true if the folder existed.
    async fn delete_folder(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error>;

    // --- tags ---

    /// All tags of the owner, ordered by name ascending.
    async fn list_tags(&self, owner: &EntityId) -> Result<Vec<Tag>, Error>;

    async fn get_tag(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Tag>, Error>;

    /// Insert a tag. Duplicate (owner, name) -> `Conflict` at `name`.
    async fn insert_tag(&self, tag: Tag) -> Result<Tag, Error>;

    async fn rename_tag(
        &self,
        owner: &EntityId,
        id: &EntityId,
        name: &str,
    ) -> Result<Option<Tag>, Error>;

    /// Delete a tag and pull its id from the tag set of every note of the
    /// same owner, atomically. Returns true if the tag existed.
    async fn delete_tag(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error>;

    // --- notes ---

    /// Notes of the owner, optionally restricted to one folder, ordered by
    /// `created_at` descending.
    async fn list_notes(
        &self,
        owner: &EntityId,
        folder: Option<&EntityId>,
    ) -> Result<Vec<Note>, Error>;

    async fn get_note(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Note>, Error>;

    /// Insert a note together with its tag memberships, atomically.
    async fn insert_note(&self, note: Note) -> Result<Note, Error>;

    /// Replace title, content, created_at, folder, and tag memberships of
    /// an existing note, atomically. Returns None if no such note for this
    /// owner.
    async fn update_note(&self, note: Note) -> Result<Option<Note>, Error>;

    /// Delete a note. Returns true if it existed for this owner.
    async fn delete_note(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error>;
}
