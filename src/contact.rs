use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::LazyLock;
use thiserror::Error;
use utoipa::ToSchema;

const FROM_ADDRESS: &str = "Puget Sound Salmon Health <onboarding@resend.dev>";

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("{0} environment variable is not set")]
    Configuration(&'static str),
    #[error("Email relay failed: {0}")]
    Relay(String),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A contact request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

/// Relay credentials, read per request so they can be rotated without a restart.
#[derive(Debug, Clone)]
pub struct ContactSettings {
    pub api_key: String,
    pub to: String,
}

impl ContactSettings {
    pub fn from_env() -> Result<Self, ContactError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ContactError> {
        let present = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ContactError::Configuration(var))
        };
        let to = present("CONTACT_EMAIL")?;
        let api_key = present("RESEND_API_KEY")?;
        Ok(Self { api_key, to })
    }
}

impl ContactRequest {
    pub fn validate(self) -> Result<ContactMessage, ContactError> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let (Some(name), Some(email), Some(message)) = (
            non_blank(self.name),
            non_blank(self.email),
            non_blank(self.message),
        ) else {
            return Err(ContactError::Validation("Name, email, and message are required."));
        };

        if !is_valid_email(&email) {
            return Err(ContactError::Validation("Please enter a valid email address."));
        }

        Ok(ContactMessage {
            name,
            email,
            subject: non_blank(self.subject).map(|s| s.trim().to_string()),
            message,
        })
    }
}

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// `something@something.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    reply_to: &'a str,
    subject: String,
    text: String,
    html: String,
}

impl ContactMessage {
    fn to_email<'a>(&'a self, to: &'a str) -> OutboundEmail<'a> {
        let subject_line = self.subject.as_deref().unwrap_or("(none)");
        let name = escape_html(&self.name);
        let email = escape_html(&self.email);

        OutboundEmail {
            from: FROM_ADDRESS,
            to,
            reply_to: &self.email,
            subject: format!(
                "[Contact Form] {}",
                self.subject.as_deref().unwrap_or("Message from website")
            ),
            text: format!(
                "Name: {}\nEmail: {}\nSubject: {}\n\n{}",
                self.name, self.email, subject_line, self.message
            ),
            html: format!(
                "<p><strong>Name:</strong> {name}</p>\n\
                 <p><strong>Email:</strong> <a href=\"mailto:{email}\">{email}</a></p>\n\
                 <p><strong>Subject:</strong> {}</p>\n<hr />\n<p>{}</p>",
                escape_html(subject_line),
                escape_html(&self.message).replace('\n', "<br />"),
            ),
        }
    }
}

/// Sends contact messages through the Resend HTTP API.
pub struct ContactRelay {
    client: Client,
    base_url: String,
}

impl ContactRelay {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send(
        &self,
        settings: &ContactSettings,
        message: &ContactMessage,
    ) -> Result<(), ContactError> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&settings.api_key)
            .json(&message.to_email(&settings.to))
            .send()
            .await
            .map_err(|e| ContactError::Relay(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ContactError::Relay(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}
