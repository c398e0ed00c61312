//! Mail notifier: confirmation links, OTP codes, raw messages and bulk sends

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use serde::Serialize;
use std::{
    ops::Range,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tera::{Context, Tera};
use tokio::task::JoinSet;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

const SUBJECT: &str = "LibraBook";

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A message ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Delivers one message; synchronous from the caller's point of view
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()>;
}

/// SMTP relay transport
#[derive(Clone)]
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let from_name = config.smtp_from_name.as_deref().unwrap_or("LibraBook");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.smtp_use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port)
        .timeout(Some(Duration::from_millis(config.send_timeout_ms)));

        let builder = if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> AppResult<Message> {
        let to = Mailbox::from_str(&mail.to)
            .map_err(|e| AppError::EmailDeliveryFailed(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());

        let message = match &mail.html {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(mail.text.clone()),
        };

        message.map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        let message = self.build_message(&mail)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport blocks on network I/O
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::Internal(format!("Mail task failed: {}", e)))?
            .map_err(|e| AppError::EmailDeliveryFailed(e.to_string()))?;

        tracing::debug!(to = %mail.to, "Email sent");
        Ok(())
    }
}

/// One recipient the bulk job could not reach
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedRecipient {
    pub email: String,
    pub error: String,
}

/// Outcome of a bulk send
#[derive(Debug, Clone, Serialize)]
pub struct BulkSendReport {
    pub sent: usize,
    pub failed: Vec<FailedRecipient>,
    pub elapsed_ms: u128,
}

/// Split `len` items into `workers` contiguous segments of `len / workers`;
/// the last segment takes the remainder. Empty segments are dropped.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let segment = len / workers;

    (0..workers)
        .map(|i| {
            let start = i * segment;
            let end = if i == workers - 1 { len } else { start + segment };
            start..end
        })
        .filter(|range| !range.is_empty())
        .collect()
}

#[derive(Clone)]
pub struct MailNotifier {
    mailer: Arc<dyn Mailer>,
    templates: Arc<Tera>,
    base_url: String,
    send_timeout: Duration,
}

impl MailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: impl Into<String>) -> AppResult<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                (
                    "mail/confirmation.html",
                    include_str!("../../templates/mail/confirmation.html"),
                ),
                ("mail/otp.txt", include_str!("../../templates/mail/otp.txt")),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to load mail templates: {}", e)))?;

        Ok(Self {
            mailer,
            templates: Arc::new(templates),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        })
    }

    /// Give up on a message after `timeout`; the caller then sees `EmailDeliveryFailed`
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    async fn deliver(&self, mail: OutgoingMail) -> AppResult<()> {
        match tokio::time::timeout(self.send_timeout, self.mailer.send(mail)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::EmailDeliveryFailed(format!(
                "no answer from mail transport within {} ms",
                self.send_timeout.as_millis()
            ))),
        }
    }

    pub fn activation_link(&self, confirmation: &str) -> String {
        format!("{}/activate/{}", self.base_url, confirmation)
    }

    /// Send the account activation link
    pub async fn send_confirmation(&self, to: &str, confirmation: &str) -> AppResult<()> {
        let link = self.activation_link(confirmation);

        let mut context = Context::new();
        context.insert("link", &link);
        let html = self
            .templates
            .render("mail/confirmation.html", &context)
            .map_err(|e| AppError::Internal(format!("Failed to render confirmation email: {}", e)))?;

        self.deliver(OutgoingMail {
            to: to.to_string(),
            subject: SUBJECT.to_string(),
            text: format!("Confirm your LibraBook account: {}", link),
            html: Some(html),
        })
        .await
    }

    /// Send a one-time password
    pub async fn send_otp(&self, to: &str, code: &str) -> AppResult<()> {
        let mut context = Context::new();
        context.insert("code", code);
        let text = self
            .templates
            .render("mail/otp.txt", &context)
            .map_err(|e| AppError::Internal(format!("Failed to render OTP email: {}", e)))?;

        self.send_text(to, &text).await
    }

    /// Send a raw text body
    pub async fn send_text(&self, to: &str, text: &str) -> AppResult<()> {
        self.deliver(OutgoingMail {
            to: to.to_string(),
            subject: SUBJECT.to_string(),
            text: text.to_string(),
            html: None,
        })
        .await
    }

    /// Send `text` to every recipient using `workers` concurrent senders.
    /// Each worker walks its own segment sequentially; failures are collected, not fatal.
    pub async fn send_bulk(&self, recipients: Vec<String>, workers: usize, text: &str) -> BulkSendReport {
        let started = Instant::now();
        let recipients = Arc::new(recipients);
        let mut tasks = JoinSet::new();

        for range in partition(recipients.len(), workers) {
            let notifier = self.clone();
            let recipients = Arc::clone(&recipients);
            let text = text.to_string();

            tasks.spawn(async move {
                let mut sent = 0;
                let mut failed = Vec::new();
                for email in &recipients[range] {
                    match notifier.send_text(email, &text).await {
                        Ok(()) => sent += 1,
                        Err(e) => {
                            tracing::warn!(action = "bulk_send", email = %email, error = %e, "Email not delivered");
                            failed.push(FailedRecipient {
                                email: email.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
                (sent, failed)
            });
        }

        let mut report = BulkSendReport {
            sent: 0,
            failed: Vec::new(),
            elapsed_ms: 0,
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((sent, failed)) => {
                    report.sent += sent;
                    report.failed.extend(failed);
                }
                Err(e) => tracing::error!(action = "bulk_send", "Bulk mail worker failed: {}", e),
            }
        }

        report.elapsed_ms = started.elapsed().as_millis();
        tracing::info!(
            action = "bulk_send",
            sent = report.sent,
            failed = report.failed.len(),
            elapsed_ms = report.elapsed_ms as u64,
            "Bulk email finished"
        );

        report
    }
}
