//! Sentinel-directive extraction from model replies.
//!
//! The model embeds instructions in its free-text answer using fixed
//! sentinel prefixes (`TAREA_CMD:`, `CALENDAR_CMD:`, `MEMORIA_CMD:`,
//! `EMAIL_CMD:`) with `|`-delimited arguments. This module finds every
//! occurrence (not just the first), parses each into a typed [`Directive`]
//! or a typed [`ParseError`], and returns the reply with the directive
//! spans removed. Removal never discards trailing text: whatever follows a
//! directive (including further directives) survives into the clean text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::SLOT_COUNT;

pub const TASK_PREFIX: &str = "TAREA_CMD:";
pub const CALENDAR_PREFIX: &str = "CALENDAR_CMD:";
pub const MEMORY_PREFIX: &str = "MEMORIA_CMD:";
pub const EMAIL_PREFIX: &str = "EMAIL_CMD:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectiveKind {
    Task,
    Calendar,
    Memory,
    Email,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Task => "tarea",
            DirectiveKind::Calendar => "calendario",
            DirectiveKind::Memory => "memoria",
            DirectiveKind::Email => "email",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            DirectiveKind::Task => TASK_PREFIX,
            DirectiveKind::Calendar => CALENDAR_PREFIX,
            DirectiveKind::Memory => MEMORY_PREFIX,
            DirectiveKind::Email => EMAIL_PREFIX,
        }
    }
}

const ALL_KINDS: [DirectiveKind; 4] = [
    DirectiveKind::Task,
    DirectiveKind::Calendar,
    DirectiveKind::Memory,
    DirectiveKind::Email,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Directive {
    TaskList,
    TaskAdd {
        title: String,
        due_date: String,
        subtasks: Vec<String>,
    },
    TaskCheck {
        row: i64,
        slot: i64,
    },
    TaskExtend {
        row: i64,
    },
    Calendar {
        title: String,
        start: String,
        end: String,
        note: String,
        rrule: Option<String>,
    },
    Memory {
        fact: String,
    },
    Email {
        to: String,
        subject: String,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseError {
    #[error("acción de tarea desconocida: '{0}'")]
    UnknownTaskAction(String),
    #[error("'{action}' requiere al menos {expected} argumentos (recibió {got})")]
    MissingArguments {
        action: String,
        expected: usize,
        got: usize,
    },
    #[error("identificador no numérico: '{0}'")]
    BadNumber(String),
    #[error("directiva vacía")]
    EmptyPayload,
}

/// One matched sentinel span. Malformed payloads are kept (with their
/// error) instead of silently dropped, so the caller can surface them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDirective {
    pub kind: DirectiveKind,
    pub raw: String,
    pub parsed: Result<Directive, ParseError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedReply {
    pub clean_text: String,
    pub directives: Vec<ParsedDirective>,
}

/// Scan a model reply for directive spans, in text order.
///
/// A span runs from its sentinel prefix to the end of the line (the grammar
/// is line-oriented) or to the next sentinel on the same line, whichever
/// comes first. Stray `|` delimiters and whitespace sharing the directive's
/// line are trimmed away with it; earlier lines, which may legitimately end
/// in `|` (markdown table rows), are left intact.
pub fn extract_directives(reply: &str) -> ExtractedReply {
    let mut matches: Vec<(usize, DirectiveKind)> = Vec::new();
    for kind in ALL_KINDS {
        let prefix = kind.prefix();
        let mut from = 0;
        while let Some(pos) = reply[from..].find(prefix) {
            matches.push((from + pos, kind));
            from += pos + prefix.len();
        }
    }
    matches.sort_by_key(|(pos, _)| *pos);

    let mut directives = Vec::new();
    let mut clean = String::new();
    let mut cursor = 0;

    for (i, &(start, kind)) in matches.iter().enumerate() {
        if start < cursor {
            // Inside the previous span (e.g. a prefix embedded in a payload).
            continue;
        }

        let payload_start = start + kind.prefix().len();
        let line_end = reply[payload_start..]
            .find('\n')
            .map(|p| payload_start + p)
            .unwrap_or(reply.len());
        let next_start = matches[i + 1..]
            .iter()
            .map(|(pos, _)| *pos)
            .find(|&pos| pos > start)
            .unwrap_or(reply.len());
        let end = line_end.min(next_start);

        let raw = reply[start..end].to_string();
        let payload = &reply[payload_start..end];
        let parsed = parse_payload(kind, payload);
        directives.push(ParsedDirective { kind, raw, parsed });

        // Text before the span. Delimiter debris is trimmed only from the
        // directive's own line so a preceding table row keeps its pipes.
        let before = &reply[cursor..start];
        let (earlier, line) = match before.rfind('\n') {
            Some(p) => before.split_at(p + 1),
            None => ("", before),
        };
        let line = line.trim_end_matches(|c: char| c == '|' || c == ' ' || c == '\t');
        clean.push_str(earlier);
        clean.push_str(line);
        cursor = end;
        // A directive alone on its line takes the line break with it.
        if line.is_empty() && reply[cursor..].starts_with('\n') {
            cursor += 1;
        }
    }
    clean.push_str(&reply[cursor..]);

    ExtractedReply {
        clean_text: clean.trim().to_string(),
        directives,
    }
}

fn parse_payload(kind: DirectiveKind, payload: &str) -> Result<Directive, ParseError> {
    match kind {
        DirectiveKind::Task => parse_task(payload),
        DirectiveKind::Calendar => parse_calendar(payload),
        DirectiveKind::Memory => parse_memory(payload),
        DirectiveKind::Email => parse_email(payload),
    }
}

/// Split a payload on unescaped `|`. `\|` produces a literal pipe inside a
/// field; every field is whitespace-trimmed.
pub fn split_fields(payload: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                current.push('|');
            }
            '|' => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn parse_number(field: &str) -> Result<i64, ParseError> {
    field
        .parse::<i64>()
        .map_err(|_| ParseError::BadNumber(field.to_string()))
}

fn parse_task(payload: &str) -> Result<Directive, ParseError> {
    let fields = split_fields(payload);
    let action = fields[0].to_uppercase();

    match action.as_str() {
        "LISTAR" => Ok(Directive::TaskList),
        "AGREGAR" => {
            // AGREGAR | título | fecha | sub1 | sub2 | ...
            if fields.len() < 3 {
                return Err(ParseError::MissingArguments {
                    action,
                    expected: 2,
                    got: fields.len() - 1,
                });
            }
            let subtasks: Vec<String> = fields[3..]
                .iter()
                .filter(|s| !s.is_empty())
                .take(SLOT_COUNT)
                .cloned()
                .collect();
            Ok(Directive::TaskAdd {
                title: fields[1].clone(),
                due_date: fields[2].clone(),
                subtasks,
            })
        }
        "CHECK" => {
            if fields.len() < 3 {
                return Err(ParseError::MissingArguments {
                    action,
                    expected: 2,
                    got: fields.len() - 1,
                });
            }
            Ok(Directive::TaskCheck {
                row: parse_number(&fields[1])?,
                slot: parse_number(&fields[2])?,
            })
        }
        "EXTENDER" => {
            if fields.len() < 2 {
                return Err(ParseError::MissingArguments {
                    action,
                    expected: 1,
                    got: fields.len() - 1,
                });
            }
            Ok(Directive::TaskExtend {
                row: parse_number(&fields[1])?,
            })
        }
        "" => Err(ParseError::EmptyPayload),
        other => Err(ParseError::UnknownTaskAction(other.to_string())),
    }
}

fn parse_calendar(payload: &str) -> Result<Directive, ParseError> {
    // Título | inicio | fin | nota | RRULE, the last two optional
    let fields = split_fields(payload);
    if fields.len() < 3 || fields[..3].iter().any(|f| f.is_empty()) {
        return Err(ParseError::MissingArguments {
            action: "CALENDAR".to_string(),
            expected: 3,
            got: fields.iter().take(3).filter(|f| !f.is_empty()).count(),
        });
    }

    let note = fields.get(3).cloned().unwrap_or_default();
    // Only a fragment that at least names a frequency counts as a rule.
    let rrule = fields
        .get(4)
        .filter(|f| f.contains("FREQ="))
        .cloned();

    Ok(Directive::Calendar {
        title: fields[0].clone(),
        start: fields[1].clone(),
        end: fields[2].clone(),
        note,
        rrule,
    })
}

fn parse_memory(payload: &str) -> Result<Directive, ParseError> {
    let fact = payload.trim();
    if fact.is_empty() {
        return Err(ParseError::EmptyPayload);
    }
    Ok(Directive::Memory {
        fact: fact.to_string(),
    })
}

fn parse_email(payload: &str) -> Result<Directive, ParseError> {
    let fields = split_fields(payload);
    if fields.len() < 3 || fields[..3].iter().any(|f| f.is_empty()) {
        return Err(ParseError::MissingArguments {
            action: "EMAIL".to_string(),
            expected: 3,
            got: fields.iter().take(3).filter(|f| !f.is_empty()).count(),
        });
    }
    Ok(Directive::Email {
        to: fields[0].clone(),
        subject: fields[1].clone(),
        body: fields[2].clone(),
    })
}
