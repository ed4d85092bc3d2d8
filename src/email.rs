use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::error::Error;

const DEFAULT_RELAY: &str = "smtp.gmail.com";

/// SMTP submission of plain-text mail through a STARTTLS relay.
#[derive(Debug)]
pub struct EmailSender {
    sender_address: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSender {
    pub fn new(username: &str, password: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Self::with_relay(DEFAULT_RELAY, username, password)
    }

    pub fn with_relay(
        relay: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self {
            sender_address: username.to_string(),
            transport,
        })
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let message = Message::builder()
            .from(self.sender_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok("Correo enviado".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_recipient() {
        let sender = EmailSender::new("asistente@example.com", "secret").unwrap();
        let result = sender.send("no es una dirección", "Hola", "Cuerpo").await;
        assert!(result.is_err());
    }
}
