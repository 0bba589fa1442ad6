use crate::models::{MessageRow, UserRow};
use crate::{Database, DbError};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, ffi};
use uuid::Uuid;

impl Database {
    // -- Users --

    /// Insert a user row. The UNIQUE constraint on `username` is the source of
    /// truth for duplicates, so a racing insert still surfaces as
    /// `DbError::DuplicateUsername`.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow, DbError> {
        let conn = self.lock()?;
        let id = Uuid::new_v4().to_string();

        match conn.execute(
            "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
            (&id, username, password_hash),
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(DbError::DuplicateUsername);
            }
            Err(e) => return Err(e.into()),
        }

        query_user_by_id(&conn, &id)?
            .ok_or_else(|| anyhow!("User {} missing right after insert", id).into())
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Messages --

    /// Append a message to a room. The timestamp is never earlier than the
    /// newest message already in that room, so insertion order and
    /// `created_at_ms` order agree even if the wall clock steps back.
    pub fn append_message(&self, room: &str, user: &str, text: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let latest: Option<i64> = conn.query_row(
                "SELECT MAX(created_at_ms) FROM messages WHERE room = ?1",
                [room],
                |row| row.get(0),
            )?;
            let now = chrono::Utc::now().timestamp_millis();
            let created_at_ms = latest.map_or(now, |latest| latest.max(now));

            let row = MessageRow {
                id: Uuid::new_v4().to_string(),
                room: room.to_string(),
                user: user.to_string(),
                text: text.to_string(),
                created_at_ms,
            };

            conn.execute(
                "INSERT INTO messages (id, room, user, text, created_at_ms) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![row.id, row.room, row.user, row.text, row.created_at_ms],
            )?;

            Ok(row)
        })
    }

    /// Full history of a room, oldest first. Unknown rooms yield an empty list.
    pub fn get_messages_by_room(&self, room: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages_by_room(conn, room))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages_by_room(conn: &Connection, room: &str) -> Result<Vec<MessageRow>> {
    // rowid breaks ties between messages stamped in the same millisecond
    let mut stmt = conn.prepare(
        "SELECT id, room, user, text, created_at_ms
         FROM messages
         WHERE room = ?1
         ORDER BY created_at_ms ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map([room], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                room: row.get(1)?,
                user: row.get(2)?,
                text: row.get(3)?,
                created_at_ms: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbError};

    #[test]
    fn create_and_find_user() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_user("alice", "$argon2id$fake").unwrap();

        let found = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.password, "$argon2id$fake");
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected_by_store() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "h1").unwrap();

        let err = db.create_user("alice", "h2").err().unwrap();
        assert!(matches!(err, DbError::DuplicateUsername));

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE username = 'alice'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn messages_come_back_in_append_order() {
        let db = Database::open_in_memory().unwrap();
        for text in ["m1", "m2", "m3"] {
            db.append_message("general", "alice", text).unwrap();
        }
        db.append_message("random", "bob", "elsewhere").unwrap();

        let rows = db.get_messages_by_room("general").unwrap();
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["m1", "m2", "m3"]);
        assert!(rows.windows(2).all(|w| w[0].created_at_ms <= w[1].created_at_ms));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let db = Database::open_in_memory().unwrap();
        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room, user, text, created_at_ms) VALUES ('x', 'general', 'carol', 'early', ?1)",
                [future],
            )?;
            Ok(())
        })
        .unwrap();

        let row = db.append_message("general", "alice", "later").unwrap();
        assert_eq!(row.created_at_ms, future);

        let texts: Vec<String> = db
            .get_messages_by_room("general")
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["early", "later"]);
    }

    #[test]
    fn unknown_room_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_messages_by_room("nowhere").unwrap().is_empty());
    }

    #[test]
    fn row_converts_to_wire_message() {
        let db = Database::open_in_memory().unwrap();
        let row = db.append_message("general", "alice", "hi").unwrap();
        let ms = row.created_at_ms;
        let msg = row.into_message();
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.created_at.timestamp_millis(), ms);
    }
}
