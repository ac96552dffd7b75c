//! services/notifier/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::NaiveTime;
use compliance_core::{builtin_catalog, schema::find_entity_type, DeliverySettings, EntityType};
use lettre::message::Mailbox;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings of the outgoing mail server.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Port 465 speaks TLS from the first byte; every other port upgrades with STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }
}

/// Which content renderer writes the e-mails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RendererKind {
    Template,
    OpenAi { api_key: String, model: String },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub smtp: SmtpConfig,
    pub delivery: DeliverySettings,
    pub entity_types: Vec<EntityType>,
    pub daily_run_at: NaiveTime,
    pub scheduler_poll: Duration,
    pub renderer: RendererKind,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Mail Delivery (all fatal when absent) ---
        let server = required("SMTP_SERVER")?;
        let port_str = required("SMTP_PORT")?;
        let port = port_str.parse::<u16>().map_err(|_| {
            ConfigError::InvalidValue(
                "SMTP_PORT".to_string(),
                format!("'{}' is not a valid port number", port_str),
            )
        })?;
        let sender = mailbox("SENDER_EMAIL", required("SENDER_EMAIL")?)?;
        let password = required("SENDER_PASSWORD")?;
        let primary = mailbox("RECIPIENT_EMAIL", required("RECIPIENT_EMAIL")?)?;
        let secondary = var("RECIPIENT_EMAIL_2")
            .map(|v| mailbox("RECIPIENT_EMAIL_2", v))
            .transpose()?;
        let dry_run = match var("DRY_RUN") {
            Some(v) => parse_flag("DRY_RUN", &v)?,
            None => false,
        };
        let timeout_secs = parse_number("SMTP_TIMEOUT_SECS", var("SMTP_TIMEOUT_SECS"), 30)?;
        let timeout = Duration::from_secs(timeout_secs);

        // --- Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://database_management_1.db".to_string());

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Tracked Tables ---
        let catalog = builtin_catalog();
        let tables = var("NOTIFY_TABLES").unwrap_or_else(|| "collaborateurs".to_string());
        let entity_types = tables
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|table| {
                find_entity_type(&catalog, table).cloned().ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "NOTIFY_TABLES".to_string(),
                        format!("'{}' is not a known table", table),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if entity_types.is_empty() {
            return Err(ConfigError::InvalidValue(
                "NOTIFY_TABLES".to_string(),
                "at least one table is required".to_string(),
            ));
        }

        // --- Scheduler ---
        let run_at_str = var("DAILY_RUN_AT").unwrap_or_else(|| "08:00".to_string());
        let daily_run_at = NaiveTime::parse_from_str(&run_at_str, "%H:%M").map_err(|_| {
            ConfigError::InvalidValue(
                "DAILY_RUN_AT".to_string(),
                format!("'{}' is not a HH:MM time", run_at_str),
            )
        })?;
        let poll_secs = parse_number("SCHEDULER_POLL_SECS", var("SCHEDULER_POLL_SECS"), 30)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SCHEDULER_POLL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Content Renderer ---
        let renderer = match var("RENDERER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("template") => RendererKind::Template,
            Some("openai") => RendererKind::OpenAi {
                api_key: required("OPENAI_API_KEY")?,
                model: var("RENDER_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "RENDERER".to_string(),
                    format!("'{}' is not one of: template, openai", other),
                ))
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            smtp: SmtpConfig {
                server,
                port,
                username: sender.email.to_string(),
                password,
                timeout,
            },
            delivery: DeliverySettings {
                from: sender.to_string(),
                primary: primary.to_string(),
                secondary: secondary.map(|m| m.to_string()),
                dry_run,
            },
            entity_types,
            daily_run_at,
            scheduler_poll: Duration::from_secs(poll_secs),
            renderer,
        })
    }
}

fn mailbox(key: &str, value: String) -> Result<Mailbox, ConfigError> {
    value
        .parse::<Mailbox>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", value, e)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", value),
        )),
    }
}

fn parse_number(key: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a number", v))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SMTP_SERVER", "smtp.gmail.com"),
            ("SMTP_PORT", "587"),
            ("SENDER_EMAIL", "alertes@example.com"),
            ("SENDER_PASSWORD", " app-password "),
            ("RECIPIENT_EMAIL", "rh@example.com"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = load(&base()).unwrap();
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.implicit_tls());
        assert_eq!(config.smtp.password, "app-password");
        assert_eq!(config.smtp.timeout, Duration::from_secs(30));
        assert_eq!(config.delivery.secondary, None);
        assert!(!config.delivery.dry_run);
        assert_eq!(config.daily_run_at, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(config.scheduler_poll, Duration::from_secs(30));
        assert_eq!(config.renderer, RendererKind::Template);
        let tables: Vec<&str> = config.entity_types.iter().map(|e| e.table.as_str()).collect();
        assert_eq!(tables, vec!["collaborateurs"]);
    }

    #[test]
    fn each_required_variable_is_fatal_when_missing() {
        let required = [
            "SMTP_SERVER",
            "SMTP_PORT",
            "SENDER_EMAIL",
            "SENDER_PASSWORD",
            "RECIPIENT_EMAIL",
        ];
        for key in required {
            let mut vars = base();
            vars.remove(key);
            match load(&vars) {
                Err(ConfigError::MissingVar(name)) => assert_eq!(name, key),
                other => panic!("{key}: expected MissingVar, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let mut vars = base();
        vars.insert("SMTP_PORT", "smtp");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue(k, _)) if k == "SMTP_PORT"
        ));
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        let mut vars = base();
        vars.insert("RECIPIENT_EMAIL_2", "not an address");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue(k, _)) if k == "RECIPIENT_EMAIL_2"
        ));
    }

    #[test]
    fn optional_settings_are_read() {
        let mut vars = base();
        vars.insert("SMTP_PORT", "465");
        vars.insert("RECIPIENT_EMAIL_2", "direction@example.com");
        vars.insert("DRY_RUN", "yes");
        vars.insert("NOTIFY_TABLES", "collaborateurs, vehicles_1");
        vars.insert("DAILY_RUN_AT", "07:30");
        vars.insert("RENDERER", "openai");
        vars.insert("OPENAI_API_KEY", "sk-test");
        let config = load(&vars).unwrap();
        assert!(config.smtp.implicit_tls());
        assert_eq!(config.delivery.secondary.as_deref(), Some("direction@example.com"));
        assert!(config.delivery.dry_run);
        assert_eq!(config.entity_types.len(), 2);
        assert_eq!(config.daily_run_at, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(
            config.renderer,
            RendererKind::OpenAi {
                api_key: "sk-test".into(),
                model: "gpt-4o-mini".into()
            }
        );
    }

    #[test]
    fn unknown_tables_and_renderers_are_rejected() {
        let mut vars = base();
        vars.insert("NOTIFY_TABLES", "collaborateurs,trucks");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue(k, _)) if k == "NOTIFY_TABLES"
        ));

        let mut vars = base();
        vars.insert("RENDERER", "gemini");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue(k, _)) if k == "RENDERER"
        ));

        let mut vars = base();
        vars.insert("RENDERER", "openai");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingVar(k)) if k == "OPENAI_API_KEY"
        ));
    }
}
