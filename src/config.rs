//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Path of the libSQL database file.
    pub database_path: PathBuf,
    /// Directory for rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Spreadsheet polling. `None` disables the poller.
    pub sheets: Option<SheetsConfig>,
    /// Outbound SMTP. `None` disables email sending.
    pub smtp: Option<SmtpConfig>,
    /// Language model. `None` makes qualification fall back to manual review.
    pub llm: Option<LlmConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Where sheet rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEndpoint {
    /// A deployed Apps Script web app returning `{"success", "rows"}`.
    WebApp { url: String },
    /// Google Sheets v4 values API, authenticated with an API key.
    ValuesApi {
        spreadsheet_id: String,
        range: String,
        api_key: String,
    },
}

/// Spreadsheet poller configuration.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub endpoint: SheetEndpoint,
    pub poll_interval: Duration,
    /// On the very first sync, mark existing rows as seen instead of ingesting them.
    pub baseline_existing: bool,
}

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
    /// Implicit TLS (port 465).
    Wrapper,
    /// No TLS. Only for local relays and test servers.
    None,
}

impl FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" | "wrapper" | "ssl" => Ok(Self::Wrapper),
            "none" | "plain" => Ok(Self::None),
            other => Err(format!("expected starttls, tls or none, got {other:?}")),
        }
    }
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub from_name: String,
}

/// Language model configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Let the model personalise welcome emails before sending.
    pub personalize_emails: bool,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
            personalize_emails: false,
        }
    }
}

impl AppConfig {
    /// Build config from environment variables.
    ///
    /// Integrations whose required variables are absent are disabled rather
    /// than rejected. Values that are present but unparseable are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = ServerConfig {
            host: get("LEADFLOW_HOST").unwrap_or_else(|| ServerConfig::default().host),
            port: parse_or(&get, "LEADFLOW_PORT", ServerConfig::default().port)?,
        };

        let database_path = get("LEADFLOW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/leadflow.db"));

        let log_dir = get("LEADFLOW_LOG_DIR").map(PathBuf::from);

        let sheets = sheets_from(&get)?;
        let smtp = smtp_from(&get)?;
        let llm = llm_from(&get)?;

        Ok(Self {
            server,
            database_path,
            log_dir,
            sheets,
            smtp,
            llm,
        })
    }
}

fn sheets_from<G>(get: &G) -> Result<Option<SheetsConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let endpoint = if let Some(url) = get("SHEETS_WEB_APP_URL") {
        SheetEndpoint::WebApp { url }
    } else if let Some(spreadsheet_id) = get("SHEETS_SPREADSHEET_ID") {
        let api_key = get("SHEETS_API_KEY").ok_or_else(|| ConfigError::MissingRequired {
            key: "SHEETS_API_KEY".to_string(),
            hint: "Required when SHEETS_SPREADSHEET_ID is set.".to_string(),
        })?;
        SheetEndpoint::ValuesApi {
            spreadsheet_id,
            range: get("SHEETS_RANGE").unwrap_or_else(|| "Sheet1!A:G".to_string()),
            api_key,
        }
    } else {
        return Ok(None);
    };

    let interval_secs: u64 = parse_or(get, "SHEETS_POLL_INTERVAL_SECS", 30)?;
    if interval_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "SHEETS_POLL_INTERVAL_SECS".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    Ok(Some(SheetsConfig {
        endpoint,
        poll_interval: Duration::from_secs(interval_secs),
        baseline_existing: parse_or(get, "SHEETS_BASELINE_EXISTING", false)?,
    }))
}

fn smtp_from<G>(get: &G) -> Result<Option<SmtpConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let (Some(username), Some(password)) = (get("SMTP_USER"), get("SMTP_PASS")) else {
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
        port: parse_or(get, "SMTP_PORT", 587)?,
        tls: parse_or(get, "SMTP_TLS", SmtpTls::StartTls)?,
        from_address: get("FROM_EMAIL").unwrap_or_else(|| username.clone()),
        from_name: get("FROM_NAME").unwrap_or_else(|| "Sales Team".to_string()),
        username,
        password: SecretString::from(password),
    }))
}

fn llm_from<G>(get: &G) -> Result<Option<LlmConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(api_key) = get("OPENAI_API_KEY") else {
        return Ok(None);
    };

    let mut config = LlmConfig::new(api_key);
    if let Some(model) = get("LLM_MODEL") {
        config.model = model;
    }
    if let Some(base_url) = get("LLM_BASE_URL") {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    config.timeout = Duration::from_secs(parse_or(get, "LLM_TIMEOUT_SECS", 30)?);
    config.personalize_emails = parse_or(get, "LLM_PERSONALIZE_EMAILS", false)?;
    Ok(Some(config))
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
