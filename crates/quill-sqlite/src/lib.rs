//! SQLite implementation of the quill store trait.
//!
//! All multi-row writes (note + tag memberships, folder/tag delete with
//! cascade) run inside a single transaction, so a crash can not leave
//! dangling references behind. Uniqueness lives in the schema; duplicate
//! key failures are translated into `Error::Conflict` here and never
//! escape as raw rusqlite errors.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use quill_core::{
    get_pending_migrations, EntityId, Error, Folder, Note, Session, Tag, User, SCHEMA_VERSION,
};

#[cfg(test)]
mod tests;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database at the given path and run any pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database and run migrations.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Run any pending database migrations.
    fn run_migrations(&self) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _quill_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(db_err)?;

        let current_version: i64 = conn
            .query_row(
                "SELECT value FROM _quill_meta WHERE key = 'schema_version'",
                [],
                |row| {
                    let val: String = row.get(0)?;
                    Ok(val.parse().unwrap_or(0))
                },
            )
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        for migration in get_pending_migrations(current_version) {
            for statement in migration.statements {
                // _quill_meta creation already happened above
                if statement.contains("_quill_meta") {
                    continue;
                }
                conn.execute(statement, []).map_err(|e| {
                    Error::Database(format!("migration {} failed: {}", migration.name, e))
                })?;
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO _quill_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(db_err)?;

        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

/// Translate a uniqueness violation into a field-scoped conflict; anything
/// else stays a database error.
fn unique_conflict(e: rusqlite::Error, message: &str, location: &str) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::conflict(message, Some(location))
        }
        _ => db_err(e),
    }
}

fn id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<EntityId> {
    let raw: String = row.get(idx)?;
    EntityId::parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn opt_id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<EntityId>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        EntityId::parse(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Split a GROUP_CONCAT of tag ids into a sorted list.
fn tag_ids_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<EntityId>> {
    let concat: Option<String> = row.get(idx)?;
    let mut ids = Vec::new();
    if let Some(concat) = concat {
        for raw in concat.split(',').filter(|s| !s.is_empty()) {
            let id = EntityId::parse(raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            ids.push(id);
        }
    }
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(ids)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: id_col(row, 0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: id_col(row, 0)?,
        name: row.get(1)?,
        owner_id: id_col(row, 2)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: id_col(row, 0)?,
        name: row.get(1)?,
        owner_id: id_col(row, 2)?,
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: id_col(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: datetime_col(row, 3)?,
        owner_id: id_col(row, 4)?,
        folder_id: opt_id_col(row, 5)?,
        tags: tag_ids_col(row, 6)?,
    })
}

const NOTE_COLUMNS: &str = "n.id, n.title, n.content, n.created_at, n.owner_id, n.folder_id, \
     GROUP_CONCAT(nt.tag_id)";

#[async_trait::async_trait]
impl quill_core::Store for SqliteStore {
    async fn insert_user(&self, user: User) -> Result<User, Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, username, full_name, password_hash) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.as_str(),
                user.username,
                user.full_name,
                user.password_hash
            ],
        )
        .map_err(|e| unique_conflict(e, "username already taken", "username"))?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, username, full_name, password_hash FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn get_user(&self, id: &EntityId) -> Result<Option<User>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, username, full_name, password_hash FROM users WHERE id = ?1",
            params![id.as_str()],
            user_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn insert_session(&self, session: Session) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                session.token,
                session.user_id.as_str(),
                session.expires_at.to_rfc3339()
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: id_col(row, 1)?,
                    expires_at: datetime_col(row, 2)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, Error> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(db_err)?;
        Ok(rows > 0)
    }

    async fn list_folders(&self, owner: &EntityId) -> Result<Vec<Folder>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, name, owner_id FROM folders WHERE owner_id = ?1 ORDER BY name")
            .map_err(db_err)?;
        let folders = stmt
            .query_map(params![owner.as_str()], folder_from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(folders)
    }

    async fn get_folder(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Folder>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, owner_id FROM folders WHERE id = ?1 AND owner_id = ?2",
            params![id.as_str(), owner.as_str()],
            folder_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn insert_folder(&self, folder: Folder) -> Result<Folder, Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO folders (id, name, owner_id) VALUES (?1, ?2, ?3)",
            params![folder.id.as_str(), folder.name, folder.owner_id.as_str()],
        )
        .map_err(|e| unique_conflict(e, "folder name already in use", "name"))?;
        Ok(folder)
    }

    async fn rename_folder(
        &self,
        owner: &EntityId,
        id: &EntityId,
        name: &str,
    ) -> Result<Option<Folder>, Error> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute(
                "UPDATE folders SET name = ?1 WHERE id = ?2 AND owner_id = ?3",
                params![name, id.as_str(), owner.as_str()],
            )
            .map_err(|e| unique_conflict(e, "folder name already in use", "name"))?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(Folder {
            id: id.clone(),
            name: name.to_string(),
            owner_id: owner.clone(),
        }))
    }

    async fn delete_folder(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        // cascade first: notes referencing the folder would otherwise
        // block the delete under foreign_keys = ON
        tx.execute(
            "UPDATE notes SET folder_id = NULL WHERE owner_id = ?1 AND folder_id = ?2",
            params![owner.as_str(), id.as_str()],
        )
        .map_err(db_err)?;
        let rows = tx
            .execute(
                "DELETE FROM folders WHERE id = ?1 AND owner_id = ?2",
                params![id.as_str(), owner.as_str()],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(rows > 0)
    }

    async fn list_tags(&self, owner: &EntityId) -> Result<Vec<Tag>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id, name, owner_id FROM tags WHERE owner_id = ?1 ORDER BY name")
            .map_err(db_err)?;
        let tags = stmt
            .query_map(params![owner.as_str()], tag_from_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(tags)
    }

    async fn get_tag(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Tag>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, owner_id FROM tags WHERE id = ?1 AND owner_id = ?2",
            params![id.as_str(), owner.as_str()],
            tag_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn insert_tag(&self, tag: Tag) -> Result<Tag, Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tags (id, name, owner_id) VALUES (?1, ?2, ?3)",
            params![tag.id.as_str(), tag.name, tag.owner_id.as_str()],
        )
        .map_err(|e| unique_conflict(e, "tag name already in use", "name"))?;
        Ok(tag)
    }

    async fn rename_tag(
        &self,
        owner: &EntityId,
        id: &EntityId,
        name: &str,
    ) -> Result<Option<Tag>, Error> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute(
                "UPDATE tags SET name = ?1 WHERE id = ?2 AND owner_id = ?3",
                params![name, id.as_str(), owner.as_str()],
            )
            .map_err(|e| unique_conflict(e, "tag name already in use", "name"))?;
        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(Tag {
            id: id.clone(),
            name: name.to_string(),
            owner_id: owner.clone(),
        }))
    }

    async fn delete_tag(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        // targeted pull: only membership rows of this tag, nothing else on
        // the notes is touched. The subquery keeps the delete owner-scoped.
        tx.execute(
            "DELETE FROM note_tags WHERE tag_id IN
                 (SELECT id FROM tags WHERE id = ?1 AND owner_id = ?2)",
            params![id.as_str(), owner.as_str()],
        )
        .map_err(db_err)?;
        let rows = tx
            .execute(
                "DELETE FROM tags WHERE id = ?1 AND owner_id = ?2",
                params![id.as_str(), owner.as_str()],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(rows > 0)
    }

    async fn list_notes(
        &self,
        owner: &EntityId,
        folder: Option<&EntityId>,
    ) -> Result<Vec<Note>, Error> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!(
            "SELECT {NOTE_COLUMNS}
             FROM notes n
             LEFT JOIN note_tags nt ON n.id = nt.note_id
             WHERE n.owner_id = ?1"
        );
        if folder.is_some() {
            sql.push_str(" AND n.folder_id = ?2");
        }
        sql.push_str(" GROUP BY n.id ORDER BY n.created_at DESC, n.id DESC");

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let notes = match folder {
            Some(folder) => stmt
                .query_map(params![owner.as_str(), folder.as_str()], note_from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![owner.as_str()], note_from_row)
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>(),
        }
        .map_err(db_err)?;
        Ok(notes)
    }

    async fn get_note(&self, owner: &EntityId, id: &EntityId) -> Result<Option<Note>, Error> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {NOTE_COLUMNS}
                 FROM notes n
                 LEFT JOIN note_tags nt ON n.id = nt.note_id
                 WHERE n.id = ?1 AND n.owner_id = ?2
                 GROUP BY n.id"
            ),
            params![id.as_str(), owner.as_str()],
            note_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn insert_note(&self, note: Note) -> Result<Note, Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO notes (id, title, content, created_at, owner_id, folder_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id.as_str(),
                note.title,
                note.content,
                note.created_at.to_rfc3339(),
                note.owner_id.as_str(),
                note.folder_id.as_ref().map(|f| f.as_str()),
            ],
        )
        .map_err(db_err)?;
        for tag in &note.tags {
            tx.execute(
                "INSERT INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
                params![note.id.as_str(), tag.as_str()],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(note)
    }

    async fn update_note(&self, note: Note) -> Result<Option<Note>, Error> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        let rows = tx
            .execute(
                "UPDATE notes SET title = ?1, content = ?2, created_at = ?3, folder_id = ?4
                 WHERE id = ?5 AND owner_id = ?6",
                params![
                    note.title,
                    note.content,
                    note.created_at.to_rfc3339(),
                    note.folder_id.as_ref().map(|f| f.as_str()),
                    note.id.as_str(),
                    note.owner_id.as_str(),
                ],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Ok(None);
        }
        tx.execute(
            "DELETE FROM note_tags WHERE note_id = ?1",
            params![note.id.as_str()],
        )
        .map_err(db_err)?;
        for tag in &note.tags {
            tx.execute(
                "INSERT INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
                params![note.id.as_str(), tag.as_str()],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(Some(note))
    }

    async fn delete_note(&self, owner: &EntityId, id: &EntityId) -> Result<bool, Error> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute(
                "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
                params![id.as_str(), owner.as_str()],
            )
            .map_err(db_err)?;
        Ok(rows > 0)
    }
}
