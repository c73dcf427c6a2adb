//! Verification code email for shop registration.
//!
//! Uses the SMTP settings from the `[email]` config section. When SMTP is not
//! configured the send is skipped with a warning so local development works.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

pub struct VerificationMailer {
    config: EmailConfig,
}

impl VerificationMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a registration code that expires after `ttl_minutes`
    pub async fn send_verification_code(
        &self,
        to_email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping verification email to {}",
                to_email
            );
            return Ok(());
        }

        let subject = format!("Verify your {} account", self.config.from_name);
        let html_body = render_code_html(&self.config.from_name, code, ttl_minutes);
        let text_body = render_code_text(&self.config.from_name, code, ttl_minutes);

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
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

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");

        Ok(())
    }
}

fn render_code_html(shop_name: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Verify your email</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f5; margin: 0; padding: 40px 20px;">
    <div style="max-width: 480px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px 24px;">
        <h1 style="margin: 0 0 16px; font-size: 22px; color: #111827;">Welcome to {shop_name}!</h1>
        <p style="color: #374151; line-height: 1.6;">Your verification code is:</p>
        <p style="font-size: 32px; letter-spacing: 8px; font-weight: 700; color: #111827; text-align: center; margin: 24px 0;">{code}</p>
        <p style="color: #6b7280; font-size: 14px;">This code will expire in {ttl_minutes} minutes. If you did not request it, you can ignore this email.</p>
    </div>
</body>
</html>"#
    )
}

fn render_code_text(shop_name: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        "Welcome to {shop_name}!\n\n\
         Your verification code is: {code}\n\n\
         This code will expire in {ttl_minutes} minutes. If you did not request it, you can ignore this email.\n"
    )
}
