use crate::{config::Configuration, submission::ValidatedSubmission, ContactFormError};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt::Display;

const API_KEY_HEADER: &str = "X-Api-Key";
const TEXT_PLAIN: &str = "text/plain";

/// Request body of the MailChannels `/tx/v1/send` endpoint.
#[derive(Serialize, Debug)]
pub struct OutboundEmailMessage<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Mailbox<'a>,
    reply_to: [Mailbox<'a>; 1],
    subject: String,
    content: [Content; 1],
}

#[derive(Serialize, Debug)]
struct Personalization<'a> {
    to: [Mailbox<'a>; 1],
}

#[derive(Serialize, Debug)]
struct Mailbox<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

impl<'a> OutboundEmailMessage<'a> {
    /// Addresses a message to the site operators which they can answer straight to the submitter.
    pub fn new(
        config: &'a Configuration,
        submission: &ValidatedSubmission<'a>,
        body: String,
    ) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Mailbox {
                    email: &config.to_email,
                    name: None,
                }],
            }],
            from: Mailbox {
                email: &config.from_email,
                name: Some(&config.from_name),
            },
            reply_to: [Mailbox {
                email: submission.email,
                name: Some(submission.name),
            }],
            subject: format!("New contact from {}", submission.name),
            content: [Content {
                content_type: TEXT_PLAIN,
                value: body,
            }],
        }
    }
}

pub struct MailChannelsClient {
    client: Client,
    api_url: String,
}

impl MailChannelsClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Issues exactly one send request. Nothing is retried.
    pub async fn send(
        &self,
        message: &OutboundEmailMessage<'_>,
        api_key: Option<&str>,
    ) -> Result<(), MailChannelsError> {
        let mut request = self.client.post(&self.api_url).json(message);
        if let Some(api_key) = api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }
        let response = request.send().await.map_err(MailChannelsError::Transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = match response.text().await {
            Ok(detail) => detail,
            Err(error) => format!("Unable to read response body: {error}"),
        };
        Err(MailChannelsError::Rejected { status, detail })
    }
}

#[derive(Debug)]
pub enum MailChannelsError {
    Transport(reqwest::Error),
    Rejected { status: StatusCode, detail: String },
}

impl MailChannelsError {
    pub fn into_contact_form_error(self) -> ContactFormError {
        match self {
            MailChannelsError::Transport(error) => ContactFormError::EmailFailed {
                status: None,
                detail: error.to_string(),
            },
            MailChannelsError::Rejected { status, detail } => ContactFormError::EmailFailed {
                status: Some(status.as_u16()),
                detail,
            },
        }
    }
}

impl Display for MailChannelsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailChannelsError::Transport(error) => write!(f, "Transport error: {error}"),
            MailChannelsError::Rejected { status, detail } => {
                write!(f, "Rejected with status {status}: {detail}")
            }
        }
    }
}

impl std::error::Error for MailChannelsError {}
