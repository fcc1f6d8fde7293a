//! Outbound notifications
//!
//! One endpoint accepts either an email or an SMS payload, discriminated by
//! a `type` field. Delivery goes through a [`Notifier`]; the bundled one only
//! logs.

use std::sync::OnceLock;

use auth::validation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};

const MAX_SUBJECT_LEN: usize = 255;
const MAX_SMS_LEN: usize = 1600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    Email {
        to: String,
        subject: String,
        body: String,
    },
    Sms {
        to: String,
        message: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Email { .. } => "email",
            Notification::Sms { .. } => "sms",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::Email { to, .. } | Notification::Sms { to, .. } => to,
        }
    }

    /// Check the fields each variant requires
    pub fn validate(&self) -> ApiResult<()> {
        match self {
            Notification::Email { to, subject, body } => {
                validation::validate_email(&validation::normalize_email(to))
                    .map_err(ApiError::BadRequest)?;
                required(subject, "subject")?;
                if subject.chars().count() > MAX_SUBJECT_LEN {
                    return Err(ApiError::BadRequest(format!(
                        "subject must be at most {MAX_SUBJECT_LEN} characters long"
                    )));
                }
                required(body, "body")
            }
            Notification::Sms { to, message } => {
                if !phone_regex().is_match(to.trim()) {
                    return Err(ApiError::BadRequest("invalid phone number".to_string()));
                }
                required(message, "message")?;
                if message.chars().count() > MAX_SMS_LEN {
                    return Err(ApiError::BadRequest(format!(
                        "message must be at most {MAX_SMS_LEN} characters long"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Receipt returned once a notification has been handed off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    #[serde(rename = "type")]
    pub kind: String,
    pub recipient: String,
    pub status: String,
}

/// Delivery channel for validated notifications
pub trait Notifier: Clone + Send + Sync + 'static {
    fn send(&self, notification: &Notification) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Notifier that records each notification in the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> ApiResult<()> {
        match notification {
            Notification::Email { to, subject, .. } => {
                info!("Email notification to {}: {}", to, subject);
            }
            Notification::Sms { to, message } => {
                info!("SMS notification to {} ({} chars)", to, message.chars().count());
            }
        }
        Ok(())
    }
}

/// Validate and dispatch a notification
pub async fn dispatch<N: Notifier>(
    notifier: &N,
    notification: Notification,
) -> ApiResult<NotificationReceipt> {
    notification.validate()?;
    notifier.send(&notification).await?;

    Ok(NotificationReceipt {
        kind: notification.kind().to_string(),
        recipient: notification.recipient().to_string(),
        status: "sent".to_string(),
    })
}

fn required(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| {
        Regex::new(r"^\+?[0-9]{7,15}$").expect("Failed to compile phone regex")
    })
}
