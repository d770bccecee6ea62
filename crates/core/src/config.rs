use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Weekday;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::office_hours::{DailyWindow, OfficeHours};

/// Longest accepted timeout; keeps timestamp arithmetic far from overflow.
const MAX_TIMEOUT_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub autoresponder: AutoresponderConfig,
    pub welcome: WelcomeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub username: String,
    pub icon_url: Option<String>,
}

/// Timing and routing rules for automated replies. All durations are seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoresponderConfig {
    pub rooms: Vec<String>,
    pub job_interval_secs: u64,
    /// Minimum age of a queued message before a reply is considered.
    pub timeout_secs: u64,
    /// Grace period after agent activity before automation resumes.
    pub agent_wait_timeout_secs: u64,
    /// Messages this soon after an agent message are treated as conversation replies.
    pub conversation_timeout_secs: u64,
    /// Per-user cooldown between automated replies.
    pub user_limit_timeout_secs: u64,
    pub minimum_reply_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub office_hours: OfficeHours,
    pub company_email_domain: String,
    pub support_email: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WelcomeConfig {
    pub enabled: bool,
    pub rooms: Vec<String>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub autoresponder_rooms: Option<Vec<String>>,
    pub job_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

const DEFAULT_AUTORESPOND_MESSAGE: &str = "<@{user}> It doesn't look like anyone is available right now to help out in chat. You can open a support ticket by emailing {support_email} and we will follow up.";
const DEFAULT_WELCOME_MESSAGE: &str = "Welcome! Ask your question here and someone will be with you shortly. You can also reach us any time at {support_email}.";

impl Default for AutoresponderConfig {
    fn default() -> Self {
        let weekday = DailyWindow {
            start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        };
        let office_hours =
            [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                .into_iter()
                .fold(OfficeHours::new(Tz::UTC), |hours, day| hours.with_window(day, weekday));

        Self {
            rooms: vec!["general".to_string()],
            job_interval_secs: 30,
            timeout_secs: 300,
            agent_wait_timeout_secs: 600,
            conversation_timeout_secs: 120,
            user_limit_timeout_secs: 36_000,
            minimum_reply_timeout_secs: 15,
            send_timeout_secs: 10,
            office_hours,
            company_email_domain: String::new(),
            support_email: String::new(),
            message: DEFAULT_AUTORESPOND_MESSAGE.to_string(),
        }
    }
}

impl AutoresponderConfig {
    pub fn monitors(&self, room: &str) -> bool {
        self.rooms.iter().any(|candidate| candidate == room)
    }

    pub fn timeout(&self) -> chrono::Duration {
        seconds(self.timeout_secs)
    }

    pub fn agent_wait_timeout(&self) -> chrono::Duration {
        seconds(self.agent_wait_timeout_secs)
    }

    pub fn conversation_timeout(&self) -> chrono::Duration {
        seconds(self.conversation_timeout_secs)
    }

    pub fn user_limit_timeout(&self) -> chrono::Duration {
        seconds(self.user_limit_timeout_secs)
    }

    pub fn minimum_reply_timeout(&self) -> chrono::Duration {
        seconds(self.minimum_reply_timeout_secs)
    }

    /// How long an empty channel record must stay quiet before it can be dropped.
    pub fn idle_channel_retention(&self) -> chrono::Duration {
        seconds(self.conversation_timeout_secs.max(self.agent_wait_timeout_secs))
    }

    pub fn render_message(&self, user_id: &str) -> String {
        self.message.replace("{user}", user_id).replace("{support_email}", &self.support_email)
    }
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rooms: vec!["general".to_string()],
            message: DEFAULT_WELCOME_MESSAGE.to_string(),
        }
    }
}

fn seconds(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(value.min(MAX_TIMEOUT_SECS) as i64)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://deskbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                username: "support".to_string(),
                icon_url: None,
            },
            autoresponder: AutoresponderConfig::default(),
            welcome: WelcomeConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("deskbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(username) = slack.username {
                self.slack.username = username;
            }
            if let Some(icon_url) = slack.icon_url {
                self.slack.icon_url = Some(icon_url);
            }
        }

        if let Some(autoresponder) = patch.autoresponder {
            self.apply_autoresponder_patch(autoresponder)?;
        }

        if let Some(welcome) = patch.welcome {
            if let Some(enabled) = welcome.enabled {
                self.welcome.enabled = enabled;
            }
            if let Some(rooms) = welcome.rooms {
                self.welcome.rooms = rooms;
            }
            if let Some(message) = welcome.message {
                self.welcome.message = message;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_autoresponder_patch(&mut self, patch: AutoresponderPatch) -> Result<(), ConfigError> {
        let target = &mut self.autoresponder;
        if let Some(rooms) = patch.rooms {
            target.rooms = rooms;
        }
        if let Some(value) = patch.job_interval_secs {
            target.job_interval_secs = value;
        }
        if let Some(value) = patch.timeout_secs {
            target.timeout_secs = value;
        }
        if let Some(value) = patch.agent_wait_timeout_secs {
            target.agent_wait_timeout_secs = value;
        }
        if let Some(value) = patch.conversation_timeout_secs {
            target.conversation_timeout_secs = value;
        }
        if let Some(value) = patch.user_limit_timeout_secs {
            target.user_limit_timeout_secs = value;
        }
        if let Some(value) = patch.minimum_reply_timeout_secs {
            target.minimum_reply_timeout_secs = value;
        }
        if let Some(value) = patch.send_timeout_secs {
            target.send_timeout_secs = value;
        }
        if let Some(timezone) = patch.timezone {
            target.office_hours.set_timezone(parse_timezone(&timezone)?);
        }
        if let Some(office_hours) = patch.office_hours {
            for (day, window) in office_hours.into_days() {
                let parsed = match window {
                    Some(window) => Some(
                        DailyWindow::parse(&window.start, &window.end).map_err(|error| {
                            ConfigError::Validation(format!(
                                "autoresponder.office_hours.{}: {error}",
                                day_key(day)
                            ))
                        })?,
                    ),
                    None => None,
                };
                target.office_hours.set_window(day, parsed);
            }
        }
        if let Some(value) = patch.company_email_domain {
            target.company_email_domain = value;
        }
        if let Some(value) = patch.support_email {
            target.support_email = value;
        }
        if let Some(value) = patch.message {
            target.message = value;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DESKBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("DESKBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("DESKBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("DESKBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("DESKBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DESKBOT_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("DESKBOT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("DESKBOT_SLACK_USERNAME") {
            self.slack.username = value;
        }
        if let Some(value) = read_env("DESKBOT_SLACK_ICON_URL") {
            self.slack.icon_url = Some(value);
        }

        let autoresponder = &mut self.autoresponder;
        if let Some(value) = read_env("DESKBOT_AUTORESPONDER_ROOMS") {
            autoresponder.rooms = split_list(&value);
        }
        let timings: [(&str, &mut u64); 7] = [
            ("DESKBOT_AUTORESPONDER_JOB_INTERVAL_SECS", &mut autoresponder.job_interval_secs),
            ("DESKBOT_AUTORESPONDER_TIMEOUT_SECS", &mut autoresponder.timeout_secs),
            (
                "DESKBOT_AUTORESPONDER_AGENT_WAIT_TIMEOUT_SECS",
                &mut autoresponder.agent_wait_timeout_secs,
            ),
            (
                "DESKBOT_AUTORESPONDER_CONVERSATION_TIMEOUT_SECS",
                &mut autoresponder.conversation_timeout_secs,
            ),
            (
                "DESKBOT_AUTORESPONDER_USER_LIMIT_TIMEOUT_SECS",
                &mut autoresponder.user_limit_timeout_secs,
            ),
            (
                "DESKBOT_AUTORESPONDER_MINIMUM_REPLY_TIMEOUT_SECS",
                &mut autoresponder.minimum_reply_timeout_secs,
            ),
            ("DESKBOT_AUTORESPONDER_SEND_TIMEOUT_SECS", &mut autoresponder.send_timeout_secs),
        ];
        for (key, target) in timings {
            if let Some(value) = read_env(key) {
                *target = parse_u64(key, &value)?;
            }
        }
        if let Some(value) = read_env("DESKBOT_AUTORESPONDER_TIMEZONE") {
            autoresponder.office_hours.set_timezone(parse_timezone(&value)?);
        }
        if let Some(value) = read_env("DESKBOT_AUTORESPONDER_COMPANY_EMAIL_DOMAIN") {
            autoresponder.company_email_domain = value;
        }
        if let Some(value) = read_env("DESKBOT_AUTORESPONDER_SUPPORT_EMAIL") {
            autoresponder.support_email = value;
        }
        if let Some(value) = read_env("DESKBOT_AUTORESPONDER_MESSAGE") {
            autoresponder.message = value;
        }

        if let Some(value) = read_env("DESKBOT_WELCOME_ENABLED") {
            self.welcome.enabled = parse_bool("DESKBOT_WELCOME_ENABLED", &value)?;
        }
        if let Some(value) = read_env("DESKBOT_WELCOME_ROOMS") {
            self.welcome.rooms = split_list(&value);
        }
        if let Some(value) = read_env("DESKBOT_WELCOME_MESSAGE") {
            self.welcome.message = value;
        }

        if let Some(value) = read_env("DESKBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DESKBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("DESKBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("DESKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DESKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("DESKBOT_LOGGING_LEVEL").or_else(|| read_env("DESKBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DESKBOT_LOGGING_FORMAT").or_else(|| read_env("DESKBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(rooms) = overrides.autoresponder_rooms {
            self.autoresponder.rooms = rooms;
        }
        if let Some(job_interval_secs) = overrides.job_interval_secs {
            self.autoresponder.job_interval_secs = job_interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_autoresponder(&self.autoresponder)?;
        validate_welcome(&self.welcome, &self.autoresponder)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("deskbot.toml"), PathBuf::from("config/deskbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if slack.username.trim().is_empty() {
        return Err(ConfigError::Validation("slack.username must not be empty".to_string()));
    }

    if let Some(icon_url) = &slack.icon_url {
        if !icon_url.starts_with("http://") && !icon_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "slack.icon_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_autoresponder(autoresponder: &AutoresponderConfig) -> Result<(), ConfigError> {
    if autoresponder.rooms.iter().all(|room| room.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "autoresponder.rooms must list at least one monitored room".to_string(),
        ));
    }

    if autoresponder.job_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "autoresponder.job_interval_secs must be greater than zero".to_string(),
        ));
    }

    if autoresponder.send_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "autoresponder.send_timeout_secs must be greater than zero".to_string(),
        ));
    }

    let timeouts = [
        ("autoresponder.timeout_secs", autoresponder.timeout_secs),
        ("autoresponder.agent_wait_timeout_secs", autoresponder.agent_wait_timeout_secs),
        ("autoresponder.conversation_timeout_secs", autoresponder.conversation_timeout_secs),
        ("autoresponder.user_limit_timeout_secs", autoresponder.user_limit_timeout_secs),
        ("autoresponder.minimum_reply_timeout_secs", autoresponder.minimum_reply_timeout_secs),
    ];
    for (key, value) in timeouts {
        if value > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "{key} must be at most {MAX_TIMEOUT_SECS} seconds"
            )));
        }
    }

    if autoresponder.message.trim().is_empty() {
        return Err(ConfigError::Validation(
            "autoresponder.message must not be empty".to_string(),
        ));
    }

    if autoresponder.message.contains("{support_email}")
        && autoresponder.support_email.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "autoresponder.support_email is required when the message uses {support_email}"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_welcome(
    welcome: &WelcomeConfig,
    autoresponder: &AutoresponderConfig,
) -> Result<(), ConfigError> {
    if !welcome.enabled {
        return Ok(());
    }

    if welcome.message.trim().is_empty() {
        return Err(ConfigError::Validation(
            "welcome.message must not be empty when welcome is enabled".to_string(),
        ));
    }

    if welcome.message.contains("{support_email}") && autoresponder.support_email.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "autoresponder.support_email is required when welcome.message uses {support_email}"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!(
            "autoresponder.timezone `{value}` is not an IANA timezone name (e.g. `Europe/Berlin`)"
        ))
    })
}

fn day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    autoresponder: Option<AutoresponderPatch>,
    welcome: Option<WelcomePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    username: Option<String>,
    icon_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AutoresponderPatch {
    rooms: Option<Vec<String>>,
    job_interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
    agent_wait_timeout_secs: Option<u64>,
    conversation_timeout_secs: Option<u64>,
    user_limit_timeout_secs: Option<u64>,
    minimum_reply_timeout_secs: Option<u64>,
    send_timeout_secs: Option<u64>,
    timezone: Option<String>,
    office_hours: Option<OfficeHoursPatch>,
    company_email_domain: Option<String>,
    support_email: Option<String>,
    message: Option<String>,
}

/// A present table replaces the whole week; days left out have no office hours.
#[derive(Debug, Default, Deserialize)]
struct OfficeHoursPatch {
    monday: Option<WindowPatch>,
    tuesday: Option<WindowPatch>,
    wednesday: Option<WindowPatch>,
    thursday: Option<WindowPatch>,
    friday: Option<WindowPatch>,
    saturday: Option<WindowPatch>,
    sunday: Option<WindowPatch>,
}

impl OfficeHoursPatch {
    fn into_days(self) -> [(Weekday, Option<WindowPatch>); 7] {
        [
            (Weekday::Mon, self.monday),
            (Weekday::Tue, self.tuesday),
            (Weekday::Wed, self.wednesday),
            (Weekday::Thu, self.thursday),
            (Weekday::Fri, self.friday),
            (Weekday::Sat, self.saturday),
            (Weekday::Sun, self.sunday),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct WindowPatch {
    start: String,
    end: String,
}

#[derive(Debug, Default, Deserialize)]
struct WelcomePatch {
    enabled: Option<bool>,
    rooms: Option<Vec<String>>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
