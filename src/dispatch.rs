//! Directive execution: runs every directive found in a model reply against
//! its adapter and folds the results back into the displayed text.
//!
//! Every directive produces a [`DirectiveReport`] with either success detail
//! or a typed error. Nothing is swallowed: a malformed or failed directive
//! shows up both in the report list and as a ❌ annotation on the reply.

use thiserror::Error;

use crate::calendar::CalendarClient;
use crate::db::Store;
use crate::directive::{extract_directives, Directive, DirectiveKind, ParseError, ParsedDirective};
use crate::email::EmailSender;
use crate::logging;
use crate::memory::ProfileMemory;
use crate::tasks::{TaskBoard, TaskError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Task(#[from] TaskError),
    #[error("calendario no configurado")]
    CalendarNotConfigured,
    #[error("correo no configurado")]
    EmailNotConfigured,
    #[error("{0}")]
    Adapter(String),
    #[error("error de almacenamiento: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug)]
pub struct DirectiveReport {
    pub kind: DirectiveKind,
    pub raw: String,
    pub outcome: Result<String, DispatchError>,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    /// Reply with directive spans removed and result annotations appended.
    pub display_text: String,
    pub reports: Vec<DirectiveReport>,
}

pub struct Dispatcher<'a> {
    store: &'a Store,
    calendar: Option<&'a CalendarClient>,
    email: Option<&'a EmailSender>,
    conversation_id: Option<&'a str>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a Store) -> Self {
        Dispatcher {
            store,
            calendar: None,
            email: None,
            conversation_id: None,
        }
    }

    pub fn with_calendar(mut self, calendar: &'a CalendarClient) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_email(mut self, email: &'a EmailSender) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_conversation(mut self, conversation_id: &'a str) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Extract and execute every directive in `reply`, in text order.
    /// `local_timestamp` stamps memory facts and task rows.
    pub async fn run(&self, reply: &str, local_timestamp: &str) -> DispatchOutcome {
        let extracted = extract_directives(reply);
        let mut display = extracted.clean_text;
        let mut reports = Vec::new();

        for directive in extracted.directives {
            let report = self.execute(directive, local_timestamp).await;

            match &report.outcome {
                Ok(detail) => {
                    logging::log_directive(
                        self.conversation_id,
                        &format!("{}: {}", report.kind.as_str(), detail.lines().next().unwrap_or("")),
                    );
                    display.push_str(&success_annotation(&report, detail));
                }
                Err(e) => {
                    logging::log_error(
                        self.conversation_id,
                        &format!("directiva {} falló: {}", report.kind.as_str(), e),
                    );
                    display.push_str(&failure_annotation(&report, e));
                }
            }
            reports.push(report);
        }

        DispatchOutcome {
            display_text: display,
            reports,
        }
    }

    async fn execute(&self, directive: ParsedDirective, local_timestamp: &str) -> DirectiveReport {
        let ParsedDirective { kind, raw, parsed } = directive;
        let outcome = match parsed {
            Err(e) => Err(DispatchError::Parse(e)),
            Ok(d) => self.execute_parsed(d, local_timestamp).await,
        };
        DirectiveReport { kind, raw, outcome }
    }

    async fn execute_parsed(
        &self,
        directive: Directive,
        local_timestamp: &str,
    ) -> Result<String, DispatchError> {
        let board = TaskBoard::new(self.store);
        match directive {
            Directive::TaskList => Ok(board.list_markdown()?),
            Directive::TaskAdd {
                title,
                due_date,
                subtasks,
            } => Ok(board.add(&title, &due_date, &subtasks, local_timestamp)?),
            Directive::TaskCheck { row, slot } => Ok(board.check(row, slot)?),
            Directive::TaskExtend { row } => Ok(board.extend(row)?),
            Directive::Calendar {
                title,
                start,
                end,
                note,
                rrule,
            } => {
                let client = self.calendar.ok_or(DispatchError::CalendarNotConfigured)?;
                let recurring = rrule.is_some();
                let link = client
                    .insert_event(&title, &start, &end, &note, rrule.as_deref())
                    .await
                    .map_err(|e| DispatchError::Adapter(e.to_string()))?;
                let tipo = if recurring { "repetitivo" } else { "único" };
                Ok(format!("Evento {} creado: {}", tipo, link))
            }
            Directive::Memory { fact } => {
                ProfileMemory::new(self.store).remember(local_timestamp, &fact)?;
                logging::log_memory(self.conversation_id, &format!("fact guardado: {}", fact));
                Ok("Guardado en perfil".to_string())
            }
            Directive::Email { to, subject, body } => {
                let sender = self.email.ok_or(DispatchError::EmailNotConfigured)?;
                let detail = sender
                    .send(&to, &subject, &body)
                    .await
                    .map_err(|e| DispatchError::Adapter(e.to_string()))?;
                Ok(detail)
            }
        }
    }
}

fn success_annotation(report: &DirectiveReport, detail: &str) -> String {
    match report.kind {
        DirectiveKind::Task => {
            // Icon depends on the action, mirrored from the raw payload.
            let upper = report.raw.to_uppercase();
            if upper.contains("LISTAR") {
                format!("\n\n📋 {}", detail)
            } else if upper.contains("CHECK") {
                format!("\n\n📈 {}", detail)
            } else if upper.contains("EXTENDER") {
                format!("\n\n➕ {}", detail)
            } else {
                format!("\n\n✅ {}", detail)
            }
        }
        DirectiveKind::Calendar => format!("\n\n✅ {}", detail),
        DirectiveKind::Memory => "\n(💾 Guardado en perfil)".to_string(),
        DirectiveKind::Email => format!("\n\n✅ {}", detail),
    }
}

fn failure_annotation(report: &DirectiveReport, error: &DispatchError) -> String {
    match report.kind {
        DirectiveKind::Task => format!("\n\n❌ Error procesando tarea: {}", error),
        DirectiveKind::Calendar => format!("\n\n❌ Error de calendario: {}", error),
        DirectiveKind::Memory => format!("\n\n❌ Error guardando en perfil: {}", error),
        DirectiveKind::Email => format!("\n\n❌ Error correo: {}", error),
    }
}
