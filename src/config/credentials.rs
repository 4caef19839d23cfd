use crate::ConfigError;
use std::fmt;

/// API token loaded once from the process environment
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Reads the token from the named environment variable
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token.trim())),
            _ => Err(ConfigError::MissingToken(var.to_string())),
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}
