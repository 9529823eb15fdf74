//! REST request builder
//!
//! Parameters live in sorted maps so the canonical encoding (and therefore
//! the signature) does not depend on insertion order.

use reqwest::Method;
use std::collections::BTreeMap;

pub(crate) const TIMESTAMP_KEY: &str = "timestamp";
pub(crate) const SIGNATURE_KEY: &str = "signature";
pub(crate) const RECV_WINDOW_KEY: &str = "recvWindow";

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) endpoint: String,
    pub(crate) query: BTreeMap<String, String>,
    pub(crate) form: BTreeMap<String, String>,
    pub(crate) recv_window: Option<u64>,
    pub(crate) signed: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: BTreeMap::new(),
            form: BTreeMap::new(),
            recv_window: None,
            signed: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Adds a query parameter
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    /// Adds a query parameter only when a value is present
    pub fn param_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Adds a form body parameter
    pub fn form_param(mut self, key: &str, value: impl ToString) -> Self {
        self.form.insert(key.to_string(), value.to_string());
        self
    }

    pub fn recv_window(mut self, millis: u64) -> Self {
        self.recv_window = Some(millis);
        self
    }

    /// Marks the request as requiring a timestamp and HMAC signature
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Parameters that carry the signature: the form body when it has
    /// entries, otherwise the query string
    pub(crate) fn carrier_mut(&mut self) -> &mut BTreeMap<String, String> {
        if self.form.is_empty() {
            &mut self.query
        } else {
            &mut self.form
        }
    }

    pub(crate) fn carrier(&self) -> &BTreeMap<String, String> {
        if self.form.is_empty() {
            &self.query
        } else {
            &self.form
        }
    }
}

/// `application/x-www-form-urlencoded` encoding in key order
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}
