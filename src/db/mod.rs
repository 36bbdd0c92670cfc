mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "tns-reporter")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("tns-reporter.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Target operations
    // ============================================================

    pub fn get_all_targets(&self) -> Result<Vec<Target>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, ra, dec, created_at, updated_at
             FROM targets ORDER BY name",
        )?;

        let targets = stmt
            .query_map([], target_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(targets)
    }

    pub fn get_target(&self, id: Uuid) -> Result<Option<Target>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let target = conn
            .query_row(
                "SELECT id, name, ra, dec, created_at, updated_at
                 FROM targets WHERE id = ?",
                [id.to_string()],
                target_from_row,
            )
            .optional()?;
        Ok(target)
    }

    /// Create a target together with its initial aliases.
    pub fn create_target(&self, input: CreateTargetInput) -> Result<TargetWithNames> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO targets (id, name, ra, dec, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                input.ra,
                input.dec,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        let mut aliases = Vec::with_capacity(input.aliases.len());
        for name in input.aliases {
            aliases.push(insert_target_name(&tx, id, name)?);
        }
        tx.commit()?;

        Ok(TargetWithNames {
            target: Target {
                id,
                name: input.name,
                ra: input.ra,
                dec: input.dec,
                created_at: now,
                updated_at: now,
            },
            aliases,
        })
    }

    pub fn get_target_with_names(&self, id: Uuid) -> Result<Option<TargetWithNames>> {
        let Some(target) = self.get_target(id)? else {
            return Ok(None);
        };
        let aliases = self.get_target_names(id)?;
        Ok(Some(TargetWithNames { target, aliases }))
    }

    /// Aliases of a target, in the order they were recorded.
    pub fn get_target_names(&self, target_id: Uuid) -> Result<Vec<TargetName>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, target_id, name, created_at
             FROM target_names WHERE target_id = ? ORDER BY rowid",
        )?;

        let names = stmt
            .query_map([target_id.to_string()], |row| {
                Ok(TargetName {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    target_id: parse_uuid(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }

    /// Give a target a new canonical name, keeping the old one as an alias.
    ///
    /// The rename and the alias insert commit together. Returns the created
    /// alias, or `None` when the target already carries `new_name`.
    pub fn rename_target(&self, id: Uuid, new_name: &str) -> Result<Option<TargetName>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let old_name: String = tx
            .query_row(
                "SELECT name FROM targets WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("Target not found"))?;

        if old_name == new_name {
            return Ok(None);
        }

        tx.execute(
            "UPDATE targets SET name = ?, updated_at = ? WHERE id = ?",
            (new_name, Utc::now().to_rfc3339(), id.to_string()),
        )?;
        let alias = insert_target_name(&tx, id, old_name)?;
        tx.commit()?;

        Ok(Some(alias))
    }

    // ============================================================
    // Message operations
    // ============================================================

    pub fn add_message(
        &self,
        target_id: Uuid,
        level: MessageLevel,
        text: impl Into<String>,
    ) -> Result<Message> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let text = text.into();

        conn.execute(
            "INSERT INTO messages (id, target_id, level, text, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                target_id.to_string(),
                level.as_str(),
                &text,
                now.to_rfc3339(),
            ),
        )?;

        Ok(Message {
            id,
            target_id,
            level,
            text,
            created_at: now,
        })
    }

    /// Return and delete every pending message for a target.
    pub fn take_messages(&self, target_id: Uuid) -> Result<Vec<Message>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let messages = {
            let mut stmt = tx.prepare(
                "SELECT id, target_id, level, text, created_at
                 FROM messages WHERE target_id = ? ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([target_id.to_string()], |row| {
                    Ok(Message {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        target_id: parse_uuid(row.get::<_, String>(1)?),
                        level: MessageLevel::from_str(&row.get::<_, String>(2)?)
                            .unwrap_or(MessageLevel::Info),
                        text: row.get(3)?,
                        created_at: parse_datetime(row.get::<_, String>(4)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        tx.execute(
            "DELETE FROM messages WHERE target_id = ?",
            [target_id.to_string()],
        )?;
        tx.commit()?;

        Ok(messages)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn insert_target_name(conn: &Connection, target_id: Uuid, name: String) -> Result<TargetName> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO target_names (id, target_id, name, created_at) VALUES (?, ?, ?, ?)",
        (
            id.to_string(),
            target_id.to_string(),
            &name,
            now.to_rfc3339(),
        ),
    )?;

    Ok(TargetName {
        id,
        target_id,
        name,
        created_at: now,
    })
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        ra: row.get(2)?,
        dec: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        updated_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
