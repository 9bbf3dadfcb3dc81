use crate::ContactFormError;
use lambda_http::{
    http::{
        header::{CONTENT_TYPE, USER_AGENT},
        HeaderMap, HeaderName,
    },
    Request,
};
use multer::Multipart;
use percent_encoding::percent_decode;
use serde_json::Value;
use std::{borrow::Cow, collections::HashMap, fmt::Display, io::Cursor, str::Utf8Error};

const UNKNOWN: &str = "unknown";

const NAME: &str = "name";
const EMAIL: &str = "email";
const COMPANY: &str = "company";
const MESSAGE: &str = "message";
const WEBSITE: &str = "website";
const SUBMISSION_FIELDS: [&str; 5] = [NAME, EMAIL, COMPANY, MESSAGE, WEBSITE];

type Fields = HashMap<String, String>;

#[derive(Debug, Default)]
struct ParsedBody {
    fields: Fields,
    /// First submission field whose JSON value was neither a string nor `null`.
    non_string_field: Option<String>,
}

impl From<Fields> for ParsedBody {
    fn from(fields: Fields) -> Self {
        Self {
            fields,
            non_string_field: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Multipart,
    FormUrlEncoded,
    Json,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("multipart/form-data") {
            Some(ContentKind::Multipart)
        } else if content_type.contains("application/x-www-form-urlencoded") {
            Some(ContentKind::FormUrlEncoded)
        } else if content_type.contains("application/json") {
            Some(ContentKind::Json)
        } else {
            None
        }
    }
}

/// A contact form submission with every missing field defaulted to empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundSubmission {
    pub name: String,
    pub email: String,
    pub company: String,
    pub message: String,
    /// Hidden from people, so only bots fill it in.
    pub website: String,
}

impl InboundSubmission {
    /// Negotiates the body format from the `Content-Type` header and extracts the submission.
    pub async fn from_request(request: &Request) -> Result<Self, ContactFormError> {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let Some(kind) = ContentKind::from_content_type(content_type) else {
            return Err(ContactFormError::UnsupportedMediaType);
        };
        let body: &[u8] = request.body().as_ref();
        let parsed = match kind {
            ContentKind::Multipart => parse_multipart(content_type, body.to_vec())
                .await
                .map(ParsedBody::from),
            ContentKind::FormUrlEncoded => parse_form_urlencoded(body).map(ParsedBody::from),
            ContentKind::Json => parse_json(body),
        }
        .map_err(ContactFormError::MalformedBody)?;
        let submission = Self::from_fields(parsed.fields);
        // A filled honeypot wins over type errors in the other fields.
        match parsed.non_string_field {
            Some(key) if !submission.is_honeypot_tripped() => Err(
                ContactFormError::MalformedBody(ParseError::NotAString(key)),
            ),
            _ => Ok(submission),
        }
    }

    fn from_fields(mut fields: Fields) -> Self {
        let mut take = |key: &str| fields.remove(key).unwrap_or_default();
        Self {
            name: take(NAME),
            email: take(EMAIL),
            company: take(COMPANY),
            message: take(MESSAGE),
            website: take(WEBSITE),
        }
    }

    pub fn is_honeypot_tripped(&self) -> bool {
        !self.website.is_empty()
    }

    pub fn validate(&self) -> Result<ValidatedSubmission<'_>, ContactFormError> {
        if [&self.name, &self.email, &self.message]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(ContactFormError::MissingFields);
        }
        Ok(ValidatedSubmission {
            name: &self.name,
            email: &self.email,
            company: &self.company,
            message: &self.message,
        })
    }
}

/// Submission whose required fields are known to be non-blank. Values are kept untrimmed.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedSubmission<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub company: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub ip: String,
    pub user_agent: String,
}

impl RequestMetadata {
    pub fn from_headers(headers: &HeaderMap, client_ip_header: &HeaderName) -> Self {
        let header = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };
        Self {
            ip: header(client_ip_header),
            user_agent: header(&USER_AGENT),
        }
    }
}

async fn parse_multipart(content_type: &str, body: Vec<u8>) -> Result<Fields, ParseError> {
    let boundary = multer::parse_boundary(content_type).map_err(ParseError::Multipart)?;
    let mut multipart = Multipart::with_reader(Cursor::new(body), boundary);
    let mut fields = Fields::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ParseError::Multipart)?
    {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        let value = field.bytes().await.map_err(ParseError::Multipart)?;
        let value = std::str::from_utf8(&value).map_err(ParseError::InvalidUtf8)?;
        fields.insert(name, value.to_owned());
    }
    Ok(fields)
}

fn parse_form_urlencoded(body: &[u8]) -> Result<Fields, ParseError> {
    body.split(|&byte| byte == b'&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, String), ParseError> {
            let mut parts = pair.splitn(2, |&byte| byte == b'=');
            let name = decode_form_component(parts.next().unwrap_or_default())?;
            let value = decode_form_component(parts.next().unwrap_or_default())?;
            Ok((name, value))
        })
        .collect()
}

/// Decodes one name or value of a urlencoded form. The decoded bytes must be UTF-8.
fn decode_form_component(component: &[u8]) -> Result<String, ParseError> {
    let component: Vec<u8> = component
        .iter()
        .map(|&byte| if byte == b'+' { b' ' } else { byte })
        .collect();
    percent_decode(&component)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(ParseError::InvalidUtf8)
}

fn parse_json(body: &[u8]) -> Result<ParsedBody, ParseError> {
    let Value::Object(object) = serde_json::from_slice(body).map_err(ParseError::Json)? else {
        return Err(ParseError::NotAnObject);
    };
    let mut parsed = ParsedBody::default();
    for (key, value) in object {
        if key == WEBSITE {
            if let Some(website) = honeypot_value(value) {
                parsed.fields.insert(key, website);
            }
            continue;
        }
        match value {
            Value::String(value) => {
                parsed.fields.insert(key, value);
            }
            Value::Null => {}
            _ if SUBMISSION_FIELDS.contains(&key.as_str()) => {
                parsed.non_string_field.get_or_insert(key);
            }
            // Extra properties the form may post alongside are irrelevant.
            _ => {}
        }
    }
    Ok(parsed)
}

/// Any JSON value a browser script would treat as truthy fills the honeypot.
fn honeypot_value(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::String(value) => Some(value),
        other => Some(other.to_string()),
    }
}

#[derive(Debug)]
pub enum ParseError {
    Json(serde_json::Error),
    NotAnObject,
    NotAString(String),
    InvalidUtf8(Utf8Error),
    Multipart(multer::Error),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Json(error) => write!(f, "Invalid JSON: {error}"),
            ParseError::NotAnObject => write!(f, "JSON body is not an object"),
            ParseError::NotAString(key) => write!(f, "Field {key} is not a string"),
            ParseError::InvalidUtf8(error) => write!(f, "Invalid UTF-8 in form data: {error}"),
            ParseError::Multipart(error) => write!(f, "Invalid multipart body: {error}"),
        }
    }
}

impl std::error::Error for ParseError {}
