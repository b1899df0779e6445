//! Textcast configuration system.
//!
//! Settings are loaded once at startup and handed around by reference.
//! The only way to change a setting is [`Settings::update_setting`], which
//! validates, mutates and saves in one step.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

use crate::error::{CampaignError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "textcast.toml";
pub const ACCOUNT_SID_ENV: &str = "TWILIO_ACCOUNT_SID";
pub const AUTH_TOKEN_ENV: &str = "TWILIO_AUTH_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Checkpoint the pending set after every confirmed send.
    #[serde(default = "bool_true")]
    pub recovery: bool,
    #[serde(default = "default_recovery_file")]
    pub recovery_file: String,
    /// Price of a single message, used for the pre-send estimate.
    #[serde(default = "default_cost")]
    pub cost_per_message: f64,
    /// Pause between two sends, in seconds.
    #[serde(default = "default_delay")]
    pub delay_secs: f64,
    /// Sender address handed to the gateway.
    #[serde(default)]
    pub sender: String,
    #[serde(default = "bool_true")]
    pub use_color: bool,
    #[serde(default)]
    pub logging_level: LogLevel,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_recipients_file")]
    pub recipients_file: String,
    #[serde(default = "default_template_file")]
    pub template_file: String,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(skip)]
    path: PathBuf,
}

fn bool_true() -> bool { true }
fn default_recovery_file() -> String { "recovery.csv".into() }
fn default_cost() -> f64 { 0.0075 }
fn default_delay() -> f64 { 2.0 }
fn default_log_file() -> String { "textcast.log".into() }
fn default_recipients_file() -> String { "recipients.csv".into() }
fn default_template_file() -> String { "message.txt".into() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            recovery: true,
            recovery_file: default_recovery_file(),
            cost_per_message: default_cost(),
            delay_secs: default_delay(),
            sender: String::new(),
            use_color: true,
            logging_level: LogLevel::default(),
            log_file: default_log_file(),
            recipients_file: default_recipients_file(),
            template_file: default_template_file(),
            twilio: TwilioConfig::default(),
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

/// Where the settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    /// Parsed from an existing file.
    Loaded,
    /// The file did not exist; defaults were written to it.
    Created,
}

impl Settings {
    /// Load settings from `path`, creating the file with defaults when missing.
    pub fn load_or_init(path: &Path) -> Result<(Self, SettingsSource)> {
        if !path.exists() {
            let settings = Self {
                path: path.to_path_buf(),
                ..Self::default()
            };
            settings.save()?;
            return Ok((settings, SettingsSource::Created));
        }
        if !path.is_file() {
            return Err(CampaignError::Config(format!(
                "'{}' exists but is not a file",
                path.display()
            )));
        }
        Ok((Self::load_from(path)?, SettingsSource::Loaded))
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CampaignError::from_io(path, e))?;
        let mut settings: Self = toml::from_str(&content)
            .map_err(|e| CampaignError::Config(format!("Failed to parse config: {e}")))?;
        settings.path = path.to_path_buf();
        settings.validate()?;
        Ok(settings)
    }

    /// Write the settings back to the file they were loaded from.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CampaignError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Change one setting and persist it. Nothing is written if `value` does
    /// not parse for `field`.
    pub fn update_setting(&mut self, field: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match field {
            "recovery" => self.recovery = parse_bool(field, value)?,
            "recovery_file" => self.recovery_file = parse_path(field, value)?,
            "cost_per_message" => self.cost_per_message = parse_amount(field, value)?,
            "delay_secs" => self.delay_secs = parse_amount(field, value)?,
            "sender" => self.sender = value.to_string(),
            "use_color" => self.use_color = parse_bool(field, value)?,
            "logging_level" => self.logging_level = value.parse()?,
            "log_file" => self.log_file = parse_path(field, value)?,
            "recipients_file" => self.recipients_file = parse_path(field, value)?,
            "template_file" => self.template_file = parse_path(field, value)?,
            "twilio.account_sid" => self.twilio.account_sid = non_empty(value),
            "twilio.auth_token" => self.twilio.auth_token = non_empty(value),
            "twilio.base_url" => self.twilio.base_url = parse_path(field, value)?,
            other => {
                return Err(CampaignError::Config(format!(
                    "unknown setting '{other}'; expected one of: {}",
                    Self::FIELDS.join(", ")
                )));
            }
        }
        self.save()?;
        tracing::info!("Setting '{field}' updated");
        Ok(())
    }

    /// Names accepted by [`Settings::update_setting`].
    pub const FIELDS: [&'static str; 13] = [
        "recovery",
        "recovery_file",
        "cost_per_message",
        "delay_secs",
        "sender",
        "use_color",
        "logging_level",
        "log_file",
        "recipients_file",
        "template_file",
        "twilio.account_sid",
        "twilio.auth_token",
        "twilio.base_url",
    ];

    /// Display rows for `settings show`. Secrets are masked.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("recovery", self.recovery.to_string()),
            ("recovery_file", self.recovery_file.clone()),
            ("cost_per_message", self.cost_per_message.to_string()),
            ("delay_secs", self.delay_secs.to_string()),
            ("sender", self.sender.clone()),
            ("use_color", self.use_color.to_string()),
            ("logging_level", self.logging_level.as_str().to_string()),
            ("log_file", self.log_file.clone()),
            ("recipients_file", self.recipients_file.clone()),
            ("template_file", self.template_file.clone()),
            ("twilio.account_sid", mask(self.twilio.account_sid.as_deref())),
            ("twilio.auth_token", mask(self.twilio.auth_token.as_deref())),
            ("twilio.base_url", self.twilio.base_url.clone()),
        ]
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }

    pub fn recipients_path(&self) -> PathBuf {
        expand_path(&self.recipients_file)
    }

    pub fn recovery_path(&self) -> PathBuf {
        expand_path(&self.recovery_file)
    }

    pub fn template_path(&self) -> PathBuf {
        expand_path(&self.template_file)
    }

    pub fn log_path(&self) -> PathBuf {
        expand_path(&self.log_file)
    }

    /// Credentials from the config file, falling back to the environment.
    pub fn twilio_credentials(&self) -> Result<TwilioCredentials> {
        self.twilio.credentials_with(|key| std::env::var(key).ok())
    }

    fn validate(&self) -> Result<()> {
        check_amount("cost_per_message", self.cost_per_message)?;
        check_amount("delay_secs", self.delay_secs)?;
        Ok(())
    }
}

/// Twilio account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,
}

fn default_twilio_base_url() -> String { "https://api.twilio.com".into() }

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            base_url: default_twilio_base_url(),
        }
    }
}

/// Resolved account credentials.
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .finish()
    }
}

impl TwilioConfig {
    /// Resolve credentials, consulting `lookup` for anything the file leaves out.
    pub fn credentials_with<F>(&self, lookup: F) -> Result<TwilioCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account_sid = self
            .account_sid
            .clone()
            .or_else(|| lookup(ACCOUNT_SID_ENV))
            .filter(|v| !v.is_empty());
        let auth_token = self
            .auth_token
            .clone()
            .or_else(|| lookup(AUTH_TOKEN_ENV))
            .filter(|v| !v.is_empty());

        match (account_sid, auth_token) {
            (Some(account_sid), Some(auth_token)) => Ok(TwilioCredentials {
                account_sid,
                auth_token,
            }),
            _ => Err(CampaignError::Config(format!(
                "Twilio credentials missing: set twilio.account_sid/twilio.auth_token \
                 or the {ACCOUNT_SID_ENV}/{AUTH_TOKEN_ENV} environment variables"
            ))),
        }
    }
}

/// Console verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// `tracing` has no level above ERROR, so `critical` shares it.
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error | Self::Critical => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(CampaignError::Config(format!(
                "unsupported logging level '{other}'; expected debug|info|warning|error|critical"
            ))),
        }
    }
}

/// Expand `~` and environment variables in a configured path. An unset
/// variable leaves the path with only `~` expanded.
pub fn expand_path(p: &str) -> PathBuf {
    match shellexpand::full(p) {
        Ok(expanded) => PathBuf::from(expanded.to_string()),
        Err(_) => PathBuf::from(shellexpand::tilde(p).to_string()),
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(CampaignError::Config(format!(
            "'{field}' expects true/false, got '{value}'"
        ))),
    }
}

fn parse_amount(field: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| CampaignError::Config(format!("'{field}' expects a number, got '{value}'")))?;
    check_amount(field, parsed)?;
    Ok(parsed)
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CampaignError::Config(format!(
            "'{field}' must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

fn parse_path(field: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(CampaignError::Config(format!("'{field}' cannot be empty")));
    }
    Ok(value.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() { None } else { Some(value.to_string()) }
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}***", s.chars().take(4).collect::<String>()),
        Some(_) => "***".into(),
        None => "(from environment)".into(),
    }
}
