//! Profile store: free-text facts the assistant is told to remember.
//!
//! Facts arrive via the `MEMORIA_CMD` directive, are stamped with the local
//! time and appended verbatim. On session start they are joined into one
//! profile text injected into the system context, so knowledge accumulates
//! across conversations.

use rusqlite::Result;

use crate::db::Store;

pub struct ProfileMemory<'a> {
    store: &'a Store,
}

impl<'a> ProfileMemory<'a> {
    pub fn new(store: &'a Store) -> Self {
        ProfileMemory { store }
    }

    pub fn remember(&self, timestamp: &str, fact: &str) -> Result<()> {
        self.store.append_profile_fact(timestamp, fact)
    }

    /// All facts as one text block, one `timestamp fact` line each,
    /// oldest first.
    pub fn profile_text(&self) -> Result<String> {
        let facts = self.store.get_profile_facts()?;
        let mut text = String::new();
        for fact in facts {
            text.push_str(&fact.timestamp);
            text.push(' ');
            text.push_str(&fact.fact);
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_accumulate_in_order() {
        let store = Store::open_in_memory().unwrap();
        let memory = ProfileMemory::new(&store);

        memory.remember("2025-12-01 10:00:00", "Vive en Lima").unwrap();
        memory
            .remember("2025-12-02 09:30:00", "Prefiere reuniones por la mañana")
            .unwrap();

        let text = memory.profile_text().unwrap();
        assert_eq!(
            text,
            "2025-12-01 10:00:00 Vive en Lima\n2025-12-02 09:30:00 Prefiere reuniones por la mañana\n"
        );
    }

    #[test]
    fn empty_profile_is_empty_text() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(ProfileMemory::new(&store).profile_text().unwrap(), "");
    }
}
