//! Task-board operations behind the `TAREA_CMD` directives.

use thiserror::Error;

use crate::db::{Store, TaskRecord, SLOT_COUNT};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("no existe la tarea {0}")]
    TaskNotFound(i64),
    #[error("subtarea {0} fuera de rango (1..={SLOT_COUNT})")]
    SlotOutOfRange(i64),
    #[error("Máximo de {SLOT_COUNT} subtareas alcanzado.")]
    BoardFull,
    #[error("error de almacenamiento: {0}")]
    Store(#[from] rusqlite::Error),
}

pub struct TaskBoard<'a> {
    store: &'a Store,
}

impl<'a> TaskBoard<'a> {
    pub fn new(store: &'a Store) -> Self {
        TaskBoard { store }
    }

    /// Markdown table of every task with its subtask icons and a completion
    /// percentage. Only set slots count toward the percentage.
    pub fn list_markdown(&self) -> Result<String, TaskError> {
        let tasks = self.store.list_tasks()?;
        if tasks.is_empty() {
            return Ok("No hay tareas registradas.".to_string());
        }

        let mut out = String::from(
            "\n| ID | Tarea | Subtareas | Avance |\n| :---: | :--- | :--- | :---: |\n",
        );
        for task in &tasks {
            let icons = slot_icons(task);
            let pct = completion_percentage(task);
            out.push_str(&format!(
                "| **{}** | {} | {} | **{}** |\n",
                task.id, task.title, icons, pct
            ));
        }
        Ok(out)
    }

    /// Append a new task row: the first `subtasks.len()` slots start as
    /// pending, the rest stay blank.
    pub fn add(
        &self,
        title: &str,
        due_date: &str,
        subtasks: &[String],
        created_at: &str,
    ) -> Result<String, TaskError> {
        let n = subtasks.len().min(SLOT_COUNT);
        self.store.insert_task(title, due_date, n, created_at)?;
        Ok(format!("Tarea agregada con {} subtareas.", n))
    }

    /// Mark one subtask slot as done. `slot` is the 1-based position the
    /// user sees in the list.
    pub fn check(&self, row: i64, slot: i64) -> Result<String, TaskError> {
        if !(1..=SLOT_COUNT as i64).contains(&slot) {
            return Err(TaskError::SlotOutOfRange(slot));
        }
        self.store
            .get_task(row)?
            .ok_or(TaskError::TaskNotFound(row))?;
        self.store.update_task_slot(row, slot as usize, Some(true))?;
        Ok("Avance actualizado.".to_string())
    }

    /// Initialize the first unused slot of an existing task as pending.
    pub fn extend(&self, row: i64) -> Result<String, TaskError> {
        let task = self
            .store
            .get_task(row)?
            .ok_or(TaskError::TaskNotFound(row))?;

        let free = task
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(TaskError::BoardFull)?;
        self.store.update_task_slot(row, free + 1, Some(false))?;
        Ok("Subtarea adicional agregada.".to_string())
    }
}

fn slot_icons(task: &TaskRecord) -> String {
    let mut icons = String::new();
    for slot in task.slots.iter().flatten() {
        icons.push_str(if *slot { "✅ " } else { "⬜ " });
    }
    if icons.is_empty() {
        icons.push('—');
    }
    icons
}

/// floor(done / set × 100), "0%" when no slot is set.
fn completion_percentage(task: &TaskRecord) -> String {
    let set = task.slots.iter().flatten().count();
    if set == 0 {
        return "0%".to_string();
    }
    let done = task.slots.iter().flatten().filter(|s| **s).count();
    format!("{}%", done * 100 / set)
}
