use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion};
use serde::{de::DeserializeOwned, Deserialize};
use std::fmt::Display;

#[async_trait]
pub trait SecretRepository {
    async fn open() -> Self;

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, lambda_http::Error>;
}

const DEFAULT_REGION: &str = "eu-north-1";

pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

/// `AWS_REGION` (set by the Lambda runtime) or the AWS profile, else the region the site is deployed in.
fn region_provider() -> RegionProviderChain {
    RegionProviderChain::default_provider().or_else(DEFAULT_REGION)
}

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider());
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        Self(aws_sdk_secretsmanager::Client::new(&config))
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, lambda_http::Error> {
        let secret = self.0.get_secret_value().secret_id(name).send().await?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(Box::new(SecretError::MissingSecretString(name.into())));
        };
        Ok(serde_json::from_str(secret_value)?)
    }
}

/// Shape of the secret holding the MailChannels credentials.
#[derive(Deserialize, Clone)]
pub struct MailChannelsCredentials {
    #[serde(rename = "MAILCHANNELS_API_KEY")]
    pub api_key: String,
}

#[derive(Debug)]
pub enum SecretError {
    MissingSecretString(String),
}

impl Display for SecretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretError::MissingSecretString(name) => {
                write!(f, "Secret {name} has no string value")
            }
        }
    }
}

impl std::error::Error for SecretError {}

#[cfg(test)]
mod tests {
    use super::region_provider;
    use googletest::prelude::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn takes_region_from_environment() -> Result<()> {
        std::env::set_var("AWS_REGION", "us-west-2");

        let region = region_provider().region().await;

        std::env::remove_var("AWS_REGION");
        verify_that!(region.map(|region| region.to_string()), some(eq("us-west-2")))
    }
}
