//! API Credential Management
//!
//! BingX API key and secret loaded from environment variables.
//! The secret only ever leaves this type to key the request signer.

use std::fmt;

/// String wrapper that keeps API keys and secrets out of logs
///
/// `Debug` prints `SecretString(***)`, `Display` prints `first4...last4`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        SecretString(value.into())
    }

    /// Returns the raw value. Only for signing and request headers.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Format: `first4...last4`, or `***` for short values
    pub fn masked(&self) -> String {
        let s = &self.0;
        if s.len() <= 8 || !s.is_ascii() {
            return "***".to_string();
        }
        format!("{}...{}", &s[..4], &s[s.len() - 4..])
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString::new(s)
    }
}

/// BingX API credentials
#[derive(Clone, Debug)]
pub struct Credentials {
    /// Sent as the `X-BX-APIKEY` header
    pub api_key: SecretString,
    /// HMAC-SHA256 signing key
    pub secret_key: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            secret_key: SecretString::new(secret_key),
        }
    }

    /// Loads credentials from `BINGX_API_KEY` and `BINGX_SECRET_KEY`
    ///
    /// Values are trimmed and must be non-empty.
    pub fn from_env() -> Result<Self, String> {
        let api_key = read_var("BINGX_API_KEY")?;
        let secret_key = read_var("BINGX_SECRET_KEY")?;
        Ok(Self::new(api_key, secret_key))
    }
}

fn read_var(name: &str) -> Result<String, String> {
    let value = std::env::var(name)
        .map_err(|_| format!("{name} not set. Export it before running authenticated calls"))?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(format!("{name} is empty after trimming whitespace"));
    }
    Ok(value)
}
