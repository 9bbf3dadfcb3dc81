mod config;
mod mailchannels;
mod message_body;
mod responses;
mod secrets;
mod submission;

use async_once_cell::OnceCell;
use config::Configuration;
use lambda_http::{
    http::{Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use mailchannels::{MailChannelsClient, MailChannelsError, OutboundEmailMessage};
use message_body::render_message_body;
use secrets::{AwsSecretsManagerSecretRepository, MailChannelsCredentials, SecretRepository};
use serde_json::json;
use submission::{InboundSubmission, ParseError, RequestMetadata};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Configuration::from_env()?;
    let handler = ContactFormHandler::<AwsSecretsManagerSecretRepository>::new(config).await;
    run(service_fn(|event| handler.handle(event))).await
}

struct ContactFormHandler<SecretRepositoryT: SecretRepository> {
    config: Configuration,
    secrets_repository: SecretRepositoryT,
    mailchannels: MailChannelsClient,
    mailchannels_credentials: OnceCell<MailChannelsCredentials>,
}

enum Outcome {
    Preflight,
    Discarded,
    Sent,
}

impl<SecretRepositoryT: SecretRepository> ContactFormHandler<SecretRepositoryT> {
    async fn new(config: Configuration) -> Self {
        Self {
            mailchannels: MailChannelsClient::new(config.mailchannels_api_url.as_str()),
            config,
            secrets_repository: SecretRepositoryT::open().await,
            mailchannels_credentials: Default::default(),
        }
    }

    /// Every outcome, failures included, becomes a response; the runtime never sees an error.
    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        let response = match self.process_request(&event).await {
            Ok(Outcome::Preflight) => responses::preflight(&self.config),
            Ok(Outcome::Discarded | Outcome::Sent) => responses::ok(&self.config),
            Err(error) => {
                error.log();
                error.into_response(&self.config)
            }
        };
        Ok(response)
    }

    async fn process_request(&self, event: &Request) -> Result<Outcome, ContactFormError> {
        if event.method() == Method::OPTIONS {
            return Ok(Outcome::Preflight);
        }
        if event.method() != Method::POST {
            return Err(ContactFormError::MethodNotAllowed(event.method().clone()));
        }

        let submission = InboundSubmission::from_request(event).await?;
        if submission.is_honeypot_tripped() {
            // Answer as if sent so that bots have nothing to adapt to.
            info!("Honeypot field filled in; discarding submission");
            return Ok(Outcome::Discarded);
        }
        let validated_submission = submission.validate()?;

        let metadata = RequestMetadata::from_headers(event.headers(), &self.config.client_ip_header);
        let body = render_message_body(&validated_submission, &metadata).map_err(|error| {
            ContactFormError::InternalError(format!("Error composing message: {error}"))
        })?;
        let message = OutboundEmailMessage::new(&self.config, &validated_submission, body);
        self.send_email(&message).await?;
        info!("Relayed contact form submission");
        Ok(Outcome::Sent)
    }

    async fn send_email(&self, message: &OutboundEmailMessage<'_>) -> Result<(), ContactFormError> {
        let api_key = self.mailchannels_api_key().await;
        self.mailchannels
            .send(message, api_key)
            .await
            .map_err(MailChannelsError::into_contact_form_error)
    }

    /// A failed lookup is not memoised, so the next request tries again.
    async fn mailchannels_api_key(&self) -> Option<&str> {
        let secret_name = self.config.api_key_secret_name.as_str();
        match self
            .mailchannels_credentials
            .get_or_try_init(self.secrets_repository.get_secret(secret_name))
            .await
        {
            Ok(credentials) => Some(credentials.api_key.as_str()),
            Err(error) => {
                warn!("Could not retrieve MailChannels credentials {secret_name} from AWS secrets manager: {error}");
                warn!("Sending message without an API key.");
                None
            }
        }
    }
}

#[derive(Debug)]
enum ContactFormError {
    MethodNotAllowed(Method),
    UnsupportedMediaType,
    MalformedBody(ParseError),
    MissingFields,
    EmailFailed {
        status: Option<u16>,
        detail: String,
    },
    InternalError(String),
}

impl ContactFormError {
    fn log(&self) {
        match self {
            ContactFormError::MethodNotAllowed(_)
            | ContactFormError::UnsupportedMediaType
            | ContactFormError::MalformedBody(_)
            | ContactFormError::MissingFields => {
                warn!("Client error handling contact form submission: {self}");
            }
            ContactFormError::EmailFailed { .. } | ContactFormError::InternalError(_) => {
                error!("Internal error handling contact form submission: {self}");
            }
        }
    }

    fn into_response(self, config: &Configuration) -> Response<Body> {
        match self {
            ContactFormError::MethodNotAllowed(_) => responses::method_not_allowed(config),
            ContactFormError::UnsupportedMediaType => responses::json_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                json!({ "error": "Unsupported Media Type" }),
                config,
            ),
            ContactFormError::MalformedBody(_) => responses::json_response(
                StatusCode::BAD_REQUEST,
                json!({ "error": "Malformed request body" }),
                config,
            ),
            ContactFormError::MissingFields => responses::json_response(
                StatusCode::BAD_REQUEST,
                json!({ "error": "Missing fields" }),
                config,
            ),
            ContactFormError::EmailFailed { detail, .. } => responses::json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Email failed", "detail": detail }),
                config,
            ),
            ContactFormError::InternalError(_) => responses::json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal error" }),
                config,
            ),
        }
    }
}

impl std::fmt::Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::MethodNotAllowed(method) => {
                write!(f, "Method {method} not allowed")
            }
            ContactFormError::UnsupportedMediaType => write!(f, "Unsupported Media Type"),
            ContactFormError::MalformedBody(error) => {
                write!(f, "Malformed request body: {error}")
            }
            ContactFormError::MissingFields => write!(f, "Missing fields"),
            ContactFormError::EmailFailed {
                status: Some(status),
                detail,
            } => write!(f, "Email failed with status {status}: {detail}"),
            ContactFormError::EmailFailed {
                status: None,
                detail,
            } => write!(f, "Email failed: {detail}"),
            ContactFormError::InternalError(description) => {
                write!(f, "Internal error: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
