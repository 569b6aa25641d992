//! Email service for account notifications.
//!
//! Uses SMTP via lettre for delivery with Askama text and HTML templates.
//! Without SMTP configuration the rendered text body is written to the log
//! instead, which is what local development relies on for reset links.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;

/// HTML template for the password reset email.
#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    first_name: &'a str,
    reset_url: &'a str,
}

/// Plain text template for the password reset email.
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    first_name: &'a str,
    reset_url: &'a str,
}

/// HTML template for the password changed confirmation.
#[derive(Template)]
#[template(path = "email/password_changed.html")]
struct PasswordChangedEmailHtml<'a> {
    first_name: &'a str,
}

/// Plain text template for the password changed confirmation.
#[derive(Template)]
#[template(path = "email/password_changed.txt")]
struct PasswordChangedEmailText<'a> {
    first_name: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Delivery {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
    },
    Log,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    delivery: Delivery,
}

impl EmailService {
    /// Create an email service. `None` logs emails instead of sending them.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&SmtpConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            return Ok(Self::log_only());
        };

        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            delivery: Delivery::Smtp {
                mailer,
                from_address: config.from_address.clone(),
            },
        })
    }

    /// An email service that only logs.
    #[must_use]
    pub const fn log_only() -> Self {
        Self {
            delivery: Delivery::Log,
        }
    }

    /// Send the password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        first_name: &str,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        let html = PasswordResetEmailHtml {
            first_name,
            reset_url,
        }
        .render()?;
        let text = PasswordResetEmailText {
            first_name,
            reset_url,
        }
        .render()?;

        self.send_multipart_email(to, "Reset your NovaTech password", &text, &html)
            .await
    }

    /// Confirm that the password was changed.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_changed(&self, to: &str, first_name: &str) -> Result<(), EmailError> {
        let html = PasswordChangedEmailHtml { first_name }.render()?;
        let text = PasswordChangedEmailText { first_name }.render()?;

        self.send_multipart_email(to, "Your NovaTech password was changed", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let (mailer, from_address) = match &self.delivery {
            Delivery::Smtp {
                mailer,
                from_address,
            } => (mailer, from_address),
            Delivery::Log => {
                tracing::info!(to = %to, subject = %subject, body = %text_body, "SMTP not configured, email not sent");
                return Ok(());
            }
        };

        let email = Message::builder()
            .from(
                from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_templates_include_link() {
        let url = "http://localhost:3000/reset-password/abc123";
        let text = PasswordResetEmailText {
            first_name: "Ada",
            reset_url: url,
        }
        .render()
        .unwrap();
        let html = PasswordResetEmailHtml {
            first_name: "Ada",
            reset_url: url,
        }
        .render()
        .unwrap();

        assert!(text.contains("Ada"));
        assert!(text.contains(url));
        assert!(html.contains(url));
    }

    #[test]
    fn test_html_template_escapes_name() {
        let html = PasswordChangedEmailHtml {
            first_name: "<b>Eve</b>",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Eve</b>"));
    }

    #[tokio::test]
    async fn test_log_only_delivery_succeeds() {
        let service = EmailService::log_only();
        service
            .send_password_changed("ada@novatech.com", "Ada")
            .await
            .unwrap();
    }
}
