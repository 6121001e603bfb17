/*
 * Responsibility
 * - Read environment variables (after .env) into Config
 * - Build the CasConfig for the protected routes
 * - Validate settings (the binary refuses to start on a bad value)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::services::cas::{CasConfig, CasConfigError, XhrAwareRedirectStrategy};
use crate::services::session::SessionCookie;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    Cas(CasConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::Cas(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<CasConfigError> for ConfigError {
    fn from(e: CasConfigError) -> Self {
        ConfigError::Cas(e)
    }
}

#[derive(Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub cas: CasConfig,
    pub proxy_callback_url: Option<String>,
    pub accept_any_proxy: bool,
    pub validation_timeout: Duration,

    pub session_cookie_name: String,
    pub session_ttl: Duration,
    pub valkey_url: Option<String>,

    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port: u16 = match var("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let prefix = var("CAS_SERVER_URL_PREFIX")
            .ok_or(ConfigError::Missing("CAS_SERVER_URL_PREFIX"))?
            .trim_end_matches('/')
            .to_string();
        let login_url = var("CAS_SERVER_LOGIN_URL").unwrap_or_else(|| format!("{prefix}/login"));
        let server_name = var("CAS_SERVER_NAME").unwrap_or_default();

        let mut cas = CasConfig::new(prefix, login_url, server_name);
        cas.service = var("CAS_SERVICE");
        if let Some(name) = var("CAS_ARTIFACT_PARAMETER_NAME") {
            cas.artifact_parameter_name = name;
        }
        if let Some(name) = var("CAS_SERVICE_PARAMETER_NAME") {
            cas.service_parameter_name = name;
        }
        cas.encode_service_url = flag(&var, "CAS_ENCODE_SERVICE_URL", cas.encode_service_url)?;
        cas.append_port = flag(&var, "CAS_APPEND_PORT", cas.append_port)?;
        cas.gateway = flag(&var, "CAS_GATEWAY", cas.gateway)?;
        cas.renew = flag(&var, "CAS_RENEW", cas.renew)?;
        cas.use_session = flag(&var, "CAS_USE_SESSION", cas.use_session)?;
        cas.redirect_after_validation = flag(
            &var,
            "CAS_REDIRECT_AFTER_VALIDATION",
            cas.redirect_after_validation,
        )?;
        cas.exception_on_validation_failure = flag(
            &var,
            "CAS_EXCEPTION_ON_VALIDATION_FAILURE",
            cas.exception_on_validation_failure,
        )?;
        cas.redirect_auth_url = flag(&var, "CAS_REDIRECT_AUTH_URL", cas.redirect_auth_url)?;
        if flag(&var, "CAS_XHR_AWARE_REDIRECT", false)? {
            cas.redirect_strategy = Arc::new(XhrAwareRedirectStrategy);
        }

        cas.proxy_receptor_url = var("CAS_PROXY_RECEPTOR_URL");
        if cas
            .proxy_receptor_path()
            .is_some_and(|path| !path.starts_with('/'))
        {
            return Err(ConfigError::Invalid("CAS_PROXY_RECEPTOR_URL"));
        }

        cas.validate()?;

        let proxy_callback_url = var("CAS_PROXY_CALLBACK_URL");
        if let Some(url) = &proxy_callback_url {
            // CAS only calls back over https
            if !url.starts_with("https://") || url::Url::parse(url).is_err() {
                return Err(ConfigError::Invalid("CAS_PROXY_CALLBACK_URL"));
            }
        }
        let accept_any_proxy = flag(&var, "CAS_ACCEPT_ANY_PROXY", false)?;
        let validation_timeout = seconds(&var, "CAS_VALIDATION_TIMEOUT_SECONDS", 10)?;

        let session_cookie_name =
            var("SESSION_COOKIE_NAME").unwrap_or_else(|| SessionCookie::DEFAULT_NAME.to_string());
        let session_ttl = seconds(&var, "SESSION_TTL_SECONDS", 1800)?;
        let valkey_url = var("VALKEY_URL");

        let request_timeout = seconds(&var, "REQUEST_TIMEOUT_SECONDS", 30)?;

        Ok(Self {
            addr,
            app_env,
            cas,
            proxy_callback_url,
            accept_any_proxy,
            validation_timeout,
            session_cookie_name,
            session_ttl,
            valkey_url,
            request_timeout,
        })
    }
}

fn flag<F>(var: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

fn seconds<F>(var: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match var(key) {
        None => default,
        Some(v) => v.parse::<u64>().map_err(|_| ConfigError::Invalid(key))?,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(Duration::from_secs(secs))
}
