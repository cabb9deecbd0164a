use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Beta (homologation) billService endpoint.
pub const BETA_ENDPOINT: &str = "https://e-beta.sunat.gob.pe/ol-ti-itcpfegem-beta/billService";

/// Production billService endpoint.
pub const PRODUCTION_ENDPOINT: &str = "https://e-factura.sunat.gob.pe/ol-ti-itcpfegem/billService";

/// Sandbox credential published for the beta service.
pub const SANDBOX_CREDENTIAL: &str = "MODDATOS";

/// Target deployment of the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Beta,
    Production,
}

impl Environment {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Beta => BETA_ENDPOINT,
            Self::Production => PRODUCTION_ENDPOINT,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Beta => "beta",
            Self::Production => "production",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown environment '{0}', expected 'beta' or 'production'")]
pub struct ParseEnvironmentError(pub String);

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beta" => Ok(Self::Beta),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Connection settings for [`super::SubmissionClient`].
///
/// Built once by the caller and passed in; nothing here is read from the
/// environment or from files.
#[derive(Clone)]
pub struct SunatConfig {
    pub endpoint: String,
    /// Issuer RUC.
    pub ruc: String,
    /// SOL user, usually `{ruc}{user}`.
    pub username: String,
    pub password: Zeroizing<String>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Extra attempts after a transport failure.
    pub max_retries: u32,
    /// Delay before retry `n` is `retry_base_delay * n`.
    pub retry_base_delay: Duration,
    /// Send over the network even with sandbox credentials.
    pub force_real_send: bool,
    pub user_agent: String,
}

impl fmt::Debug for SunatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SunatConfig")
            .field("endpoint", &self.endpoint)
            .field("ruc", &self.ruc)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("force_real_send", &self.force_real_send)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl SunatConfig {
    pub fn new(
        environment: Environment,
        ruc: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: environment.endpoint().to_string(),
            ruc: ruc.into(),
            username: username.into(),
            password: Zeroizing::new(password.into()),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            force_real_send: false,
            user_agent: concat!("comprobante/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Beta endpoint with the published sandbox credentials.
    pub fn sandbox(ruc: impl Into<String>) -> Self {
        let ruc = ruc.into();
        let username = format!("{ruc}{SANDBOX_CREDENTIAL}");
        Self::new(Environment::Beta, ruc, username, SANDBOX_CREDENTIAL)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_force_real_send(mut self, force: bool) -> Self {
        self.force_real_send = force;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Known environment for the configured endpoint, if any.
    pub fn environment(&self) -> Option<Environment> {
        match self.endpoint.as_str() {
            BETA_ENDPOINT => Some(Environment::Beta),
            PRODUCTION_ENDPOINT => Some(Environment::Production),
            _ => None,
        }
    }

    /// Sandbox credentials without `force_real_send`: no request leaves
    /// the process and submissions get a canned acceptance.
    pub fn is_simulation(&self) -> bool {
        if self.force_real_send {
            return false;
        }
        let sandbox_user = self.username == SANDBOX_CREDENTIAL
            || self
                .username
                .strip_prefix(self.ruc.as_str())
                .is_some_and(|rest| rest == SANDBOX_CREDENTIAL);
        sandbox_user && self.password.as_str() == SANDBOX_CREDENTIAL
    }
}
