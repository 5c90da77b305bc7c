use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::ContactSubmission;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("email API unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email API returned {0}")]
    Rejected(StatusCode),
}

/// Notifier
///
/// Tells the site owner about a new contact-form submission. Called after the submission
/// is stored, so a failure here never loses the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn contact_received(&self, submission: &ContactSubmission) -> Result<(), NotifyError>;
}

/// NotifierState
///
/// The concrete type used to share the notifier across the application state.
pub type NotifierState = Arc<dyn Notifier>;

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: String,
    text: String,
}

/// ResendNotifier
///
/// Sends notification emails through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendNotifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    to: String,
}

impl ResendNotifier {
    /// `api_url` is the API root (`https://api.resend.com` in production).
    pub fn new(api_url: &str, api_key: &str, from: &str, to: &str) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/emails", api_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Plain-text subject and body for a submission.
pub fn compose(submission: &ContactSubmission) -> (String, String) {
    let subject = match submission.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(subject) => format!("New contact: {}", subject.trim()),
        None => format!("New contact from {}", submission.name),
    };

    let body = format!(
        "From: {} <{}>\nReceived: {}\n\n{}",
        submission.name,
        submission.email,
        submission.created_at.to_rfc3339(),
        submission.message
    );

    (subject, body)
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn contact_received(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        let (subject, text) = compose(submission);
        let email = OutgoingEmail {
            from: &self.from,
            to: [&self.to],
            reply_to: &submission.email,
            subject,
            text,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(NotifyError::Rejected(status)),
        }
    }
}

/// LogNotifier
///
/// Local-development notifier: writes the email it would have sent to the log.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn contact_received(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        let (subject, body) = compose(submission);
        tracing::info!(%subject, %body, "contact notification (not sent)");
        Ok(())
    }
}
