// src/notify/email.rs

//! SMTP notification sink.

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::error::NotifyError;
use crate::models::{EmailConfig, JobRecord};

use super::{NotificationSink, subject};

/// Environment variable holding the SMTP login.
pub const USERNAME_VAR: &str = "SMTP_USERNAME";
/// Environment variable holding the SMTP password.
pub const PASSWORD_VAR: &str = "SMTP_PASSWORD";

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

const STYLE: &str = "table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
tr:nth-child(even) { background-color: #f9f9f9; }
.job-link { color: #0066cc; text-decoration: none; }";

/// Sends one HTML table of matches per recipient.
pub struct EmailSink {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailSink {
    /// Build a sink with credentials from `SMTP_USERNAME` / `SMTP_PASSWORD`.
    pub fn from_env(config: &EmailConfig) -> Result<Self, NotifyError> {
        let username = std::env::var(USERNAME_VAR)
            .map_err(|_| NotifyError::Setup(format!("{USERNAME_VAR} is not set")))?;
        let password = std::env::var(PASSWORD_VAR)
            .map_err(|_| NotifyError::Setup(format!("{PASSWORD_VAR} is not set")))?;
        Self::new(config, username, password)
    }

    pub fn new(config: &EmailConfig, username: String, password: String) -> Result<Self, NotifyError> {
        let sender = config.from.clone().unwrap_or_else(|| username.clone());
        let from: Mailbox = sender
            .trim()
            .parse()
            .map_err(|e| NotifyError::Setup(format!("invalid sender '{sender}': {e}")))?;

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| NotifyError::Setup(format!("invalid SMTP host '{}': {e}", config.smtp_host)))?;

        let mailer = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { mailer, from })
    }

    fn message(&self, address: &str, records: &[JobRecord]) -> Result<Message, NotifyError> {
        let build_error = |message: String| NotifyError::Build {
            address: address.to_string(),
            message,
        };
        let to: Mailbox = address.trim().parse().map_err(|e| build_error(format!("{e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject(records.len()))
            .header(header::ContentType::TEXT_HTML)
            .body(render_html(records))
            .map_err(|e| build_error(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    async fn deliver(&self, address: &str, records: &[JobRecord]) -> Result<(), NotifyError> {
        let message = self.message(address, records)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Send {
                address: address.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Render the notification body: one table row per record.
pub fn render_html(records: &[JobRecord]) -> String {
    let mut html = format!(
        "<html>\n<head>\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n\
         <h2>New Job Matches Found</h2>\n<table>\n\
         <tr><th>Company</th><th>Position</th><th>Apply Link</th></tr>\n"
    );
    for record in records {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td><a href=\"{}\" class=\"job-link\">Apply Now</a></td></tr>\n",
            html_escape::encode_text(&record.company),
            html_escape::encode_text(&record.vacancy),
            html_escape::encode_double_quoted_attribute(&record.apply_link),
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}
