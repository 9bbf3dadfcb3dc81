use anyhow::{Context, Result};
use lambda_http::http::{HeaderName, HeaderValue};
use tracing::warn;

const DEFAULT_ALLOWED_ORIGIN: &str = "*";
const DEFAULT_FROM_EMAIL: &str = "no-reply@mcbays.com";
const DEFAULT_FROM_NAME: &str = "McBays Website";
const DEFAULT_MAILCHANNELS_API_URL: &str = "https://api.mailchannels.net/tx/v1/send";
const DEFAULT_CLIENT_IP_HEADER: &str = "cf-connecting-ip";
const DEFAULT_API_KEY_SECRET_NAME: &str = "mailchannels-api-key";

/// Deployment settings, read once at cold start and shared read-only by every invocation.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub allowed_origin: HeaderValue,
    pub to_email: String,
    pub from_email: String,
    pub from_name: String,
    pub mailchannels_api_url: String,
    /// Header set by the fronting proxy with the caller's address.
    pub client_ip_header: HeaderName,
    pub api_key_secret_name: String,
}

impl Configuration {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let allowed_origin = var("ALLOWED_ORIGIN").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.into());
        let allowed_origin = HeaderValue::from_str(&allowed_origin).with_context(|| {
            format!("ALLOWED_ORIGIN {allowed_origin:?} is not a valid header value")
        })?;

        let client_ip_header =
            var("CLIENT_IP_HEADER").unwrap_or_else(|| DEFAULT_CLIENT_IP_HEADER.into());
        let client_ip_header = HeaderName::from_bytes(client_ip_header.as_bytes())
            .with_context(|| format!("CLIENT_IP_HEADER {client_ip_header:?} is not a header name"))?;

        let to_email = var("TO_EMAIL").unwrap_or_else(|| {
            warn!("TO_EMAIL is not set; the email service will reject every message");
            String::new()
        });

        Ok(Self {
            allowed_origin,
            to_email,
            from_email: var("FROM_EMAIL").unwrap_or_else(|| DEFAULT_FROM_EMAIL.into()),
            from_name: var("FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.into()),
            mailchannels_api_url: var("MAILCHANNELS_API_URL")
                .unwrap_or_else(|| DEFAULT_MAILCHANNELS_API_URL.into()),
            client_ip_header,
            api_key_secret_name: var("MAILCHANNELS_API_KEY_SECRET")
                .unwrap_or_else(|| DEFAULT_API_KEY_SECRET_NAME.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Configuration;
    use googletest::prelude::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn from_map(entries: &[(&str, &str)]) -> anyhow::Result<Configuration> {
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Configuration::from_lookup(|key| map.get(key).cloned())
    }

    #[googletest::test]
    fn falls_back_to_defaults_when_unset() {
        let config = from_map(&[]).unwrap();

        expect_that!(config.allowed_origin, eq("*"));
        expect_that!(config.to_email, eq(""));
        expect_that!(config.from_email, eq("no-reply@mcbays.com"));
        expect_that!(config.from_name, eq("McBays Website"));
        expect_that!(
            config.mailchannels_api_url,
            eq("https://api.mailchannels.net/tx/v1/send")
        );
        expect_that!(config.client_ip_header.as_str(), eq("cf-connecting-ip"));
        expect_that!(config.api_key_secret_name, eq("mailchannels-api-key"));
    }

    #[googletest::test]
    fn uses_configured_values() {
        let config = from_map(&[
            ("ALLOWED_ORIGIN", "https://mcbays.com"),
            ("TO_EMAIL", "sales@mcbays.com"),
            ("FROM_EMAIL", "web@mcbays.com"),
            ("FROM_NAME", "Contact form"),
            ("CLIENT_IP_HEADER", "X-Real-IP"),
        ])
        .unwrap();

        expect_that!(config.allowed_origin, eq("https://mcbays.com"));
        expect_that!(config.to_email, eq("sales@mcbays.com"));
        expect_that!(config.from_email, eq("web@mcbays.com"));
        expect_that!(config.from_name, eq("Contact form"));
        expect_that!(config.client_ip_header.as_str(), eq("x-real-ip"));
    }

    #[test]
    fn treats_empty_values_as_unset() -> Result<()> {
        let config = from_map(&[("FROM_NAME", ""), ("ALLOWED_ORIGIN", "")]).unwrap();

        verify_that!(config.from_name, eq("McBays Website"))?;
        verify_that!(config.allowed_origin, eq("*"))
    }

    #[test]
    fn rejects_origin_which_is_not_a_header_value() -> Result<()> {
        verify_that!(
            from_map(&[("ALLOWED_ORIGIN", "https://mcbays.com\n")]),
            err(displays_as(contains_substring("ALLOWED_ORIGIN")))
        )
    }

    #[test]
    #[serial]
    fn reads_process_environment() -> Result<()> {
        std::env::set_var("TO_EMAIL", "inbox@mcbays.com");

        let config = Configuration::from_env();

        std::env::remove_var("TO_EMAIL");
        verify_that!(config.map(|c| c.to_email), ok(eq("inbox@mcbays.com")))
    }
}
