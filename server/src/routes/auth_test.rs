use super::*;

use axum::http::{HeaderMap, HeaderValue};

fn headers_with_auth(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header value"));
    headers
}

#[test]
fn bearer_token_extracts_value() {
    let headers = headers_with_auth("Bearer abc123def");
    assert_eq!(bearer_token(&headers), Some("abc123def"));
}

#[test]
fn bearer_token_trims_padding() {
    let headers = headers_with_auth("Bearer   abc123def  ");
    assert_eq!(bearer_token(&headers), Some("abc123def"));
}

#[test]
fn missing_header_yields_none() {
    assert_eq!(bearer_token(&HeaderMap::new()), None);
}

#[test]
fn wrong_scheme_yields_none() {
    let headers = headers_with_auth("Basic dXNlcjpwYXNz");
    assert_eq!(bearer_token(&headers), None);
}

#[test]
fn lowercase_scheme_yields_none() {
    let headers = headers_with_auth("bearer abc123def");
    assert_eq!(bearer_token(&headers), None);
}

#[test]
fn empty_token_yields_none() {
    let headers = headers_with_auth("Bearer ");
    assert_eq!(bearer_token(&headers), None);

    let headers = headers_with_auth("Bearer    ");
    assert_eq!(bearer_token(&headers), None);
}
