use crate::config::Configuration;
use lambda_http::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
        },
        HeaderValue, StatusCode,
    },
    Body, Response,
};
use serde_json::{json, Value};

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

pub fn preflight(config: &Configuration) -> Response<Body> {
    with_cors(StatusCode::NO_CONTENT, Body::Empty, config)
}

pub fn method_not_allowed(config: &Configuration) -> Response<Body> {
    with_cors(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed".into(),
        config,
    )
}

pub fn ok(config: &Configuration) -> Response<Body> {
    json_response(StatusCode::OK, json!({ "ok": true }), config)
}

pub fn json_response(status: StatusCode, body: Value, config: &Configuration) -> Response<Body> {
    let mut response = with_cors(status, body.to_string().into(), config);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

fn with_cors(status: StatusCode, body: Body, config: &Configuration) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, config.allowed_origin.clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}
