//! HTTP basic authentication for the control server.

use std::fmt;
use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{header, HeaderValue, Request, Response, StatusCode};
use tower_http::validate_request::ValidateRequest;

/// Accepts requests whose `Authorization` header carries the configured credentials
pub struct BasicAuth<ResBody> {
    expected: Vec<u8>,
    _body: PhantomData<fn() -> ResBody>,
}

impl<ResBody> BasicAuth<ResBody> {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        BasicAuth { expected: format!("Basic {}", encoded).into_bytes(), _body: PhantomData }
    }

    fn accepts(&self, value: Option<&HeaderValue>) -> bool {
        match value {
            Some(value) => constant_time_eq(value.as_bytes(), &self.expected),
            None => false,
        }
    }
}

impl<ResBody> Clone for BasicAuth<ResBody> {
    fn clone(&self) -> Self {
        BasicAuth { expected: self.expected.clone(), _body: PhantomData }
    }
}

impl<ResBody> fmt::Debug for BasicAuth<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth").finish_non_exhaustive()
    }
}

impl<B, ResBody: Default> ValidateRequest<B> for BasicAuth<ResBody> {
    type ResponseBody = ResBody;

    fn validate(&mut self, request: &mut Request<B>) -> Result<(), Response<ResBody>> {
        if self.accepts(request.headers().get(header::AUTHORIZATION)) {
            return Ok(());
        }
        let mut response = Response::new(ResBody::default());
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        Err(response)
    }
}

// length is not secret
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
