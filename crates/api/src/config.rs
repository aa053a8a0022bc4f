use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Access tokens issued by the external auth provider
    pub jwt: JwtAuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Public site URL, used for share links in responses
    #[serde(default)]
    pub public_base_url: String,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `postgres` or `memory`
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// JSON file backing the memory store; in-process only when empty
    #[serde(default)]
    pub data_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            data_file: String::new(),
        }
    }
}

impl StoreConfig {
    pub fn is_postgres(&self) -> bool {
        self.backend == "postgres"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    /// Service-role connection that bypasses row-level security
    #[serde(default)]
    pub elevated_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            elevated_url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Adds Strict-Transport-Security; enable only behind TLS termination
    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// HS256 shared secret of the auth provider
    #[serde(default)]
    pub secret: String,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

/// Outbound email configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// When false, messages are logged and reported as sent
    #[serde(default)]
    pub enabled: bool,

    /// `console` (development) or `webhook`
    #[serde(default = "default_email_provider")]
    pub provider: String,

    #[serde(default)]
    pub webhook_url: String,

    /// Shared secret forwarded in the webhook body
    #[serde(default)]
    pub webhook_token: String,

    #[serde(default)]
    pub logo_url: String,

    #[serde(default = "default_brand_name")]
    pub brand_name: String,

    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            webhook_url: String::new(),
            webhook_token: String::new(),
            logo_url: String::new(),
            brand_name: default_brand_name(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub access_token: String,

    /// Sender id assigned by the provider
    #[serde(default)]
    pub phone_number_id: String,

    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,

    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    /// Template for `payment_link`; free text is sent when empty
    #[serde(default)]
    pub payment_link_template: String,

    /// Template for `payment_confirmed`; free text is sent when empty
    #[serde(default)]
    pub payment_confirmed_template: String,

    #[serde(default = "default_whatsapp_language")]
    pub template_language: String,

    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            api_version: default_whatsapp_api_version(),
            base_url: default_whatsapp_base_url(),
            payment_link_template: String::new(),
            payment_confirmed_template: String::new(),
            template_language: default_whatsapp_language(),
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Attempts for the registration confirmation email
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,

    /// Delay before retry `n` is `n * confirmation_backoff_ms`
    #[serde(default = "default_confirmation_backoff_ms")]
    pub confirmation_backoff_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            confirmation_attempts: default_confirmation_attempts(),
            confirmation_backoff_ms: default_confirmation_backoff_ms(),
        }
    }
}

/// Admin account approval workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalConfig {
    /// Address that receives approval links
    #[serde(default)]
    pub approver_email: String,

    /// Site URL the approval link points at
    #[serde(default)]
    pub link_base_url: String,

    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,

    /// Identities auto-approved as admins on every sign-in
    #[serde(default)]
    pub primary_admins: Vec<String>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            approver_email: String::new(),
            link_base_url: String::new(),
            token_ttl_days: default_token_ttl_days(),
            primary_admins: Vec::new(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_store_backend() -> String {
    "postgres".to_string()
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_jwt_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_brand_name() -> String {
    "Retiros Homens de Fe".to_string()
}
fn default_provider_timeout_ms() -> u64 {
    10_000
}
fn default_whatsapp_api_version() -> String {
    "v22.0".to_string()
}
fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_whatsapp_language() -> String {
    "pt_BR".to_string()
}
fn default_confirmation_attempts() -> u32 {
    3
}
fn default_confirmation_backoff_ms() -> u64 {
    700
}
fn default_token_ttl_days() -> i64 {
    domain::models::APPROVAL_TOKEN_TTL_DAYS
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with RETREAT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("RETREAT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("approval.primary_admins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Configuration built from embedded defaults plus `overrides`, without
    /// touching config files. Not validated, so partial configs are allowed.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30
            public_base_url = "http://localhost:5173"

            [store]
            backend = "memory"

            [logging]
            level = "info"
            format = "json"

            [jwt]
            secret = "test-secret"
            leeway_secs = 30

            [email]
            enabled = false
            provider = "console"

            [approval]
            approver_email = "approver@example.com"
            link_base_url = "http://localhost:5173"
            token_ttl_days = 7
            primary_admins = []
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        match self.store.backend.as_str() {
            "postgres" => {
                if self.database.url.is_empty() {
                    return Err(ConfigValidationError::MissingRequired(
                        "RETREAT__DATABASE__URL must be set for the postgres backend".to_string(),
                    ));
                }
            }
            "memory" => {}
            other => {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "Unknown store backend: {}",
                    other
                )));
            }
        }

        if self.jwt.secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "RETREAT__JWT__SECRET must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.notifications.confirmation_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "notifications.confirmation_attempts must be at least 1".to_string(),
            ));
        }

        if self.approval.token_ttl_days <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "approval.token_ttl_days must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.notifications.confirmation_attempts, 3);
        assert_eq!(config.notifications.confirmation_backoff_ms, 700);
        assert_eq!(config.approval.token_ttl_days, 7);
        assert_eq!(config.whatsapp.api_version, "v22.0");
        assert_eq!(config.whatsapp.template_language, "pt_BR");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("server.port", "9000"),
            ("logging.level", "debug"),
            ("whatsapp.payment_link_template", "pagamento_link"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.whatsapp.payment_link_template, "pagamento_link");
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let config = Config::load_for_test(&[("store.backend", "postgres")])
            .expect("Failed to load config");
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("RETREAT__DATABASE__URL"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let config =
            Config::load_for_test(&[("store.backend", "sqlite")]).expect("Failed to load config");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_jwt_secret_rejected() {
        let config = Config::load_for_test(&[("jwt.secret", "")]).expect("Failed to load config");
        assert!(config.validate().unwrap_err().to_string().contains("JWT"));
    }

    #[test]
    fn test_invalid_pool_settings() {
        let config = Config::load_for_test(&[
            ("database.min_connections", "100"),
            ("database.max_connections", "10"),
        ])
        .expect("Failed to load config");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("min_connections"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = Config::load_for_test(&[("notifications.confirmation_attempts", "0")])
            .expect("Failed to load config");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::load_for_test(&[("server.host", "127.0.0.1"), ("server.port", "3000")])
            .expect("Failed to load config");

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    }
}
