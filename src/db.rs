use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// Fixed number of subtask slots per task row. Slot positions are stable:
/// updates are always column-indexed writes, never positional inserts.
pub const SLOT_COUNT: usize = 15;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub timestamp: String,
    pub role: String,
    pub content: String,
}

/// One task row: a title, up to 15 tri-state subtask slots
/// (None = unset, Some(false) = pending, Some(true) = done),
/// a status label and a due date string.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    pub slots: [Option<bool>; SLOT_COUNT],
    pub status: String,
    pub due_date: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProfileFact {
    pub id: i64,
    pub timestamp: String,
    pub fact: String,
}

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                -- Chat transcript, append-only
                CREATE TABLE IF NOT EXISTS chat_messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL
                );

                -- Task board: 15 fixed subtask slot columns
                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    slot1 INTEGER, slot2 INTEGER, slot3 INTEGER,
                    slot4 INTEGER, slot5 INTEGER, slot6 INTEGER,
                    slot7 INTEGER, slot8 INTEGER, slot9 INTEGER,
                    slot10 INTEGER, slot11 INTEGER, slot12 INTEGER,
                    slot13 INTEGER, slot14 INTEGER, slot15 INTEGER,
                    status TEXT NOT NULL DEFAULT 'Pendiente',
                    due_date TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                -- Profile store: timestamped free-text facts about the user
                CREATE TABLE IF NOT EXISTS profile_facts (
                    id INTEGER PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    fact TEXT NOT NULL
                );

                -- Key/value settings (API keys, SMTP account, calendar)
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                ",
            )
        })
    }

    // ============ Chat Messages ============

    pub fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, conversation_id, timestamp, role, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.timestamp,
                    message.role,
                    message.content
                ],
            )?;
            Ok(())
        })
    }

    /// Last `limit` messages of a conversation, oldest first.
    /// Ordering is append order (rowid), not timestamp: transcript
    /// timestamps only have second resolution.
    pub fn get_conversation_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, timestamp, role, content
                 FROM chat_messages
                 WHERE conversation_id = ?1
                 ORDER BY rowid DESC
                 LIMIT ?2",
            )?;

            let messages = stmt.query_map(params![conversation_id, limit], |row| {
                Ok(ChatMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    role: row.get(3)?,
                    content: row.get(4)?,
                })
            })?;

            let mut result: Vec<ChatMessage> = messages.collect::<Result<Vec<_>>>()?;
            result.reverse();
            Ok(result)
        })
    }

    /// Distinct conversation ids, numerically sorted. Ids are digit strings;
    /// anything else in the column is ignored.
    pub fn conversation_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT conversation_id FROM chat_messages")?;
            let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut result: Vec<String> = ids
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
                .collect();
            result.sort_by_key(|id| id.parse::<u64>().unwrap_or(0));
            Ok(result)
        })
    }

    pub fn latest_conversation_id(&self) -> Result<Option<String>> {
        Ok(self.conversation_ids()?.into_iter().last())
    }

    // ============ Tasks ============

    pub fn insert_task(
        &self,
        title: &str,
        due_date: &str,
        pending_slots: usize,
        created_at: &str,
    ) -> Result<i64> {
        let n = pending_slots.min(SLOT_COUNT);
        self.with_conn(|conn| {
            let mut slots: [Option<bool>; SLOT_COUNT] = [None; SLOT_COUNT];
            for slot in slots.iter_mut().take(n) {
                *slot = Some(false);
            }
            conn.execute(
                "INSERT INTO tasks (title, slot1, slot2, slot3, slot4, slot5, slot6, slot7, slot8,
                                    slot9, slot10, slot11, slot12, slot13, slot14, slot15,
                                    status, due_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         'Pendiente', ?17, ?18)",
                params![
                    title, slots[0], slots[1], slots[2], slots[3], slots[4], slots[5], slots[6],
                    slots[7], slots[8], slots[9], slots[10], slots[11], slots[12], slots[13],
                    slots[14], due_date, created_at
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_task(&self, id: i64) -> Result<Option<TaskRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, slot1, slot2, slot3, slot4, slot5, slot6, slot7, slot8,
                        slot9, slot10, slot11, slot12, slot13, slot14, slot15,
                        status, due_date, created_at
                 FROM tasks WHERE id = ?1",
                params![id],
                map_task_row,
            )
            .optional()
        })
    }

    pub fn list_tasks(&self) -> Result<Vec<TaskRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, slot1, slot2, slot3, slot4, slot5, slot6, slot7, slot8,
                        slot9, slot10, slot11, slot12, slot13, slot14, slot15,
                        status, due_date, created_at
                 FROM tasks ORDER BY id ASC",
            )?;
            let tasks = stmt.query_map([], map_task_row)?;
            tasks.collect()
        })
    }

    /// Single-cell write to one subtask slot. `slot` is 1-based (1..=15);
    /// callers validate the range before getting here.
    pub fn update_task_slot(&self, id: i64, slot: usize, value: Option<bool>) -> Result<usize> {
        assert!((1..=SLOT_COUNT).contains(&slot));
        let sql = format!("UPDATE tasks SET slot{} = ?1 WHERE id = ?2", slot);
        self.with_conn(|conn| conn.execute(&sql, params![value, id]))
    }

    // ============ Profile Facts ============

    pub fn append_profile_fact(&self, timestamp: &str, fact: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profile_facts (timestamp, fact) VALUES (?1, ?2)",
                params![timestamp, fact],
            )?;
            Ok(())
        })
    }

    pub fn get_profile_facts(&self) -> Result<Vec<ProfileFact>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, timestamp, fact FROM profile_facts ORDER BY id ASC")?;
            let facts = stmt.query_map([], |row| {
                Ok(ProfileFact {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    fact: row.get(2)?,
                })
            })?;
            facts.collect()
        })
    }

    // ============ Settings ============

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
    }
}

fn map_task_row(row: &rusqlite::Row<'_>) -> Result<TaskRecord> {
    let mut slots: [Option<bool>; SLOT_COUNT] = [None; SLOT_COUNT];
    for (i, slot) in slots.iter_mut().enumerate() {
        *slot = row.get::<_, Option<bool>>(2 + i)?;
    }
    Ok(TaskRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        slots,
        status: row.get(17)?,
        due_date: row.get(18)?,
        created_at: row.get(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, conv: &str, role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            conversation_id: conv.to_string(),
            timestamp: "2025-12-01 10:00:00".to_string(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn chat_message_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store.append_chat_message(&msg("m1", "3", "user", "hola")).unwrap();

        let loaded = store.get_conversation_messages("3", 40).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].role, "user");
        assert_eq!(loaded[0].content, "hola");
    }

    #[test]
    fn conversation_ids_sorted_numerically() {
        let store = Store::open_in_memory().unwrap();
        for id in ["10", "2", "1"] {
            store
                .append_chat_message(&msg(&format!("m-{}", id), id, "user", "x"))
                .unwrap();
        }
        assert_eq!(store.conversation_ids().unwrap(), vec!["1", "2", "10"]);
        assert_eq!(store.latest_conversation_id().unwrap().as_deref(), Some("10"));
    }

    #[test]
    fn window_returns_most_recent_in_order() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .append_chat_message(&msg(&format!("m{}", i), "1", "user", &format!("msg {}", i)))
                .unwrap();
        }
        let window = store.get_conversation_messages("1", 3).unwrap();
        let contents: Vec<_> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn task_slots_persist_tri_state() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_task("Informe", "2025-12-09", 3, "2025-12-01 10:00:00")
            .unwrap();
        store.update_task_slot(id, 2, Some(true)).unwrap();

        let task = store.get_task(id).unwrap().unwrap();
        assert_eq!(task.slots[0], Some(false));
        assert_eq!(task.slots[1], Some(true));
        assert_eq!(task.slots[2], Some(false));
        assert_eq!(task.slots[3], None);
    }

    #[test]
    fn settings_upsert() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_setting("gemini_api_key").unwrap(), None);
        store.set_setting("gemini_api_key", "abc").unwrap();
        store.set_setting("gemini_api_key", "def").unwrap();
        assert_eq!(
            store.get_setting("gemini_api_key").unwrap().as_deref(),
            Some("def")
        );
    }
}
