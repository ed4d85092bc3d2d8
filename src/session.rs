//! Conversation sessions: id lifecycle, the history window and the
//! per-turn pipeline (context assembly, model call, directive dispatch,
//! persistence, optional voice reply).

use std::error::Error;

use uuid::Uuid;

use crate::calendar::CalendarClient;
use crate::db::{ChatMessage, Store};
use crate::dispatch::{Dispatcher, DirectiveReport};
use crate::email::EmailSender;
use crate::gemini::{GeminiClient, Part};
use crate::logging;
use crate::memory::ProfileMemory;
use crate::prompts::{build_system_context, AUDIO_TURN_NOTE, IMAGE_ATTACHED_NOTE};
use crate::tts::TtsClient;
use crate::{lima_display_time, lima_timestamp};

/// Messages of recent history injected into the system context each turn.
pub const HISTORY_WINDOW: usize = 40;

// Settings-table keys the session factory reads.
pub const SETTING_GEMINI_API_KEY: &str = "gemini_api_key";
pub const SETTING_SMTP_USERNAME: &str = "smtp_username";
pub const SETTING_SMTP_PASSWORD: &str = "smtp_password";
pub const SETTING_CALENDAR_TOKEN: &str = "calendar_token";
pub const SETTING_CALENDAR_ID: &str = "calendar_id";

#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One user turn. `audio` marks a voice turn: the model is asked to
/// transcribe, and the reply is also synthesized to speech.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: String,
    pub image: Option<Attachment>,
    pub audio: Option<Attachment>,
}

#[derive(Debug)]
pub struct TurnResult {
    /// Assistant reply with directive spans removed and result annotations
    /// appended. This is what gets persisted and shown.
    pub display_text: String,
    pub reports: Vec<DirectiveReport>,
    /// MP3 audio of the reply, present only for voice turns.
    pub audio_reply: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct AssistantSession<'a> {
    store: &'a Store,
    gemini: GeminiClient,
    calendar: Option<CalendarClient>,
    email: Option<EmailSender>,
    tts: TtsClient,
    conversation_id: String,
}

impl<'a> AssistantSession<'a> {
    /// Resume the most recent conversation, or start conversation "1" on a
    /// fresh store.
    pub fn resume_or_new(store: &'a Store, gemini: GeminiClient) -> rusqlite::Result<Self> {
        let conversation_id = store
            .latest_conversation_id()?
            .unwrap_or_else(|| "1".to_string());
        logging::log_conversation(Some(&conversation_id), "sesión iniciada");
        Ok(AssistantSession {
            store,
            gemini,
            calendar: None,
            email: None,
            tts: TtsClient::new(),
            conversation_id,
        })
    }

    /// Build a session from the settings table. The model API key is
    /// required; the calendar and email adapters attach only when their
    /// settings are present.
    pub fn from_settings(store: &'a Store) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let api_key = store
            .get_setting(SETTING_GEMINI_API_KEY)?
            .ok_or("falta la configuración 'gemini_api_key'")?;
        let mut session = Self::resume_or_new(store, GeminiClient::new(&api_key))?;

        if let (Some(token), Some(id)) = (
            store.get_setting(SETTING_CALENDAR_TOKEN)?,
            store.get_setting(SETTING_CALENDAR_ID)?,
        ) {
            session.calendar = Some(CalendarClient::new(&token, &id));
        }
        if let (Some(username), Some(password)) = (
            store.get_setting(SETTING_SMTP_USERNAME)?,
            store.get_setting(SETTING_SMTP_PASSWORD)?,
        ) {
            session.email = Some(EmailSender::new(&username, &password)?);
        }
        Ok(session)
    }

    pub fn with_calendar(mut self, calendar: CalendarClient) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_email(mut self, email: EmailSender) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_tts(mut self, tts: TtsClient) -> Self {
        self.tts = tts;
        self
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Switch to a brand-new conversation: numerically next id after the
    /// highest one on record.
    pub fn new_conversation(&mut self) -> rusqlite::Result<&str> {
        let next = self
            .store
            .conversation_ids()?
            .last()
            .and_then(|id| id.parse::<u64>().ok())
            .map(|n| n + 1)
            .unwrap_or(1);
        self.conversation_id = next.to_string();
        logging::log_conversation(Some(&self.conversation_id), "nueva conversación");
        Ok(&self.conversation_id)
    }

    /// Switch to an existing conversation by id.
    pub fn open_conversation(&mut self, conversation_id: &str) {
        self.conversation_id = conversation_id.to_string();
        logging::log_conversation(Some(&self.conversation_id), "conversación reabierta");
    }

    pub fn conversation_ids(&self) -> rusqlite::Result<Vec<String>> {
        self.store.conversation_ids()
    }

    /// The last `limit` messages of the current conversation, oldest first.
    /// Callers grow `limit` past [`HISTORY_WINDOW`] to page back in time.
    pub fn transcript(&self, limit: usize) -> rusqlite::Result<Vec<ChatMessage>> {
        self.store
            .get_conversation_messages(&self.conversation_id, limit)
    }

    fn history_text(&self) -> rusqlite::Result<String> {
        let window = self.transcript(HISTORY_WINDOW)?;
        let mut text = String::new();
        for message in window {
            text.push_str(&message.role);
            text.push_str(": ");
            text.push_str(&message.content);
            text.push('\n');
        }
        Ok(text)
    }

    /// Run one full turn: assemble context, call the model, execute the
    /// directives in the reply, persist both sides of the exchange and
    /// synthesize speech for voice turns.
    pub async fn run_turn(
        &self,
        input: TurnInput,
    ) -> Result<TurnResult, Box<dyn Error + Send + Sync>> {
        let timestamp = lima_timestamp();
        let profile = ProfileMemory::new(self.store).profile_text()?;
        let history = self.history_text()?;
        let context = build_system_context(&lima_display_time(), &profile, &history);

        let mut prompt = format!("{}\nUSUARIO: {}", context, input.text);
        if input.image.is_some() {
            prompt.push_str(IMAGE_ATTACHED_NOTE);
        }
        if input.audio.is_some() {
            prompt.push_str(AUDIO_TURN_NOTE);
        }

        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = &input.image {
            parts.push(Part::inline(&image.mime_type, &image.bytes));
        }
        if let Some(audio) = &input.audio {
            parts.push(Part::inline(&audio.mime_type, &audio.bytes));
        }

        let reply = self.gemini.generate(parts).await?;
        logging::log_model(
            Some(&self.conversation_id),
            &format!("respuesta recibida ({} caracteres)", reply.chars().count()),
        );

        let mut dispatcher =
            Dispatcher::new(self.store).with_conversation(&self.conversation_id);
        if let Some(calendar) = &self.calendar {
            dispatcher = dispatcher.with_calendar(calendar);
        }
        if let Some(email) = &self.email {
            dispatcher = dispatcher.with_email(email);
        }
        let outcome = dispatcher.run(&reply, &timestamp).await;

        let user_content = if input.text.trim().is_empty() && input.audio.is_some() {
            "🎤 (Mensaje de voz)".to_string()
        } else {
            input.text.clone()
        };
        self.persist(&timestamp, "user", &user_content)?;
        self.persist(&timestamp, "assistant", &outcome.display_text)?;

        let audio_reply = if input.audio.is_some() {
            match self.tts.synthesize(&outcome.display_text).await {
                Ok(audio) => audio,
                Err(e) => {
                    logging::log_error(
                        Some(&self.conversation_id),
                        &format!("síntesis de voz falló: {}", e),
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(TurnResult {
            display_text: outcome.display_text,
            reports: outcome.reports,
            audio_reply,
        })
    }

    fn persist(&self, timestamp: &str, role: &str, content: &str) -> rusqlite::Result<()> {
        self.store.append_chat_message(&ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: self.conversation_id.clone(),
            timestamp: timestamp.to_string(),
            role: role.to_string(),
            content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_picks_next_numeric_id() {
        let store = Store::open_in_memory().unwrap();
        for conv in ["2", "10"] {
            store
                .append_chat_message(&ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    conversation_id: conv.to_string(),
                    timestamp: "2025-12-01 10:00:00".to_string(),
                    role: "user".to_string(),
                    content: "hola".to_string(),
                })
                .unwrap();
        }

        let mut session =
            AssistantSession::resume_or_new(&store, GeminiClient::new("k")).unwrap();
        assert_eq!(session.conversation_id(), "10");
        assert_eq!(session.new_conversation().unwrap(), "11");
    }

    #[test]
    fn fresh_store_starts_at_one() {
        let store = Store::open_in_memory().unwrap();
        let session = AssistantSession::resume_or_new(&store, GeminiClient::new("k")).unwrap();
        assert_eq!(session.conversation_id(), "1");
    }

    #[test]
    fn from_settings_requires_the_api_key() {
        let store = Store::open_in_memory().unwrap();
        let err = AssistantSession::from_settings(&store).unwrap_err();
        assert!(err.to_string().contains("gemini_api_key"));
    }

    #[test]
    fn from_settings_attaches_configured_adapters() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting(SETTING_GEMINI_API_KEY, "k").unwrap();

        let session = AssistantSession::from_settings(&store).unwrap();
        assert!(session.calendar.is_none());
        assert!(session.email.is_none());

        store.set_setting(SETTING_CALENDAR_TOKEN, "tok").unwrap();
        store.set_setting(SETTING_CALENDAR_ID, "primary").unwrap();
        store
            .set_setting(SETTING_SMTP_USERNAME, "asistente@example.com")
            .unwrap();
        store.set_setting(SETTING_SMTP_PASSWORD, "secret").unwrap();

        let session = AssistantSession::from_settings(&store).unwrap();
        assert!(session.calendar.is_some());
        assert!(session.email.is_some());
    }
}
