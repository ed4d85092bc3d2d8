use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Events are always created on the owner's wall clock. No timezone
/// conversion happens here beyond naming the zone.
pub const CALENDAR_TIMEZONE: &str = "America/Lima";

#[derive(Debug, Serialize)]
struct EventRequest {
    summary: String,
    description: String,
    start: EventTime,
    end: EventTime,
    reminders: Reminders,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurrence: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct Reminders {
    #[serde(rename = "useDefault")]
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: String,
    minutes: u32,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

/// Accepts the loose "YYYY-MM-DD HH:MM" the model emits and coerces it to
/// the stricter dateTime format by string surgery: space becomes `T`, and a
/// seconds suffix is appended when missing. Nothing is validated as a real
/// date; garbage passes through to the API.
pub fn normalize_datetime(raw: &str) -> String {
    let mut iso = raw.trim().replace(' ', "T");
    if iso.len() == 16 {
        iso.push_str(":00");
    }
    iso
}

/// Prefix a rule fragment with `RRULE:` unless it already carries it.
pub fn normalize_rrule(raw: &str) -> String {
    if raw.starts_with("RRULE:") {
        raw.to_string()
    } else {
        format!("RRULE:{}", raw)
    }
}

#[derive(Debug)]
pub struct CalendarClient {
    client: Client,
    access_token: String,
    calendar_id: String,
    base_url: String,
}

impl CalendarClient {
    pub fn new(access_token: &str, calendar_id: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            access_token: access_token.to_string(),
            calendar_id: calendar_id.to_string(),
            base_url: CALENDAR_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Insert a single event and return its htmlLink. Start/end come in the
    /// loose local format; an optional RRULE fragment makes it recurring.
    pub async fn insert_event(
        &self,
        title: &str,
        start: &str,
        end: &str,
        note: &str,
        rrule: Option<&str>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let request = EventRequest {
            summary: title.to_string(),
            description: format!("Agendado por Asistente.\n{}", note),
            start: EventTime {
                date_time: normalize_datetime(start),
                time_zone: CALENDAR_TIMEZONE.to_string(),
            },
            end: EventTime {
                date_time: normalize_datetime(end),
                time_zone: CALENDAR_TIMEZONE.to_string(),
            },
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup".to_string(),
                    minutes: 10,
                }],
            },
            recurrence: rrule.map(|r| vec![normalize_rrule(r)]),
        };

        let url = format!("{}/calendars/{}/events", self.base_url, self.calendar_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(format!("Calendar API error ({}): {}", status, error_text).into());
        }

        let created: EventResponse = response.json().await?;
        Ok(created.html_link.unwrap_or_default())
    }
}
