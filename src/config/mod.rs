use chrono::Duration;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub supabase: SupabaseConfig,
    pub stripe: StripeConfig,
    pub cors: CorsConfig,
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub route_prefix: String,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub webhook_secret: String,
    pub signature_tolerance_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub appointment_window_hours: i64,
    pub contract_window_days: i64,
    pub quote_followup_days: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("HEYSPRUCE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("ROUTE_PREFIX") {
            self.server.route_prefix = v;
        }
        if let Ok(v) = env::var("MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Store overrides
        match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => self.store.backend = StoreBackend::Memory,
            Ok("supabase") => self.store.backend = StoreBackend::Supabase,
            _ => {}
        }

        // Supabase overrides
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.supabase.url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_ROLE_KEY") {
            self.supabase.service_role_key = v;
        }
        if let Ok(v) = env::var("SUPABASE_ANON_KEY") {
            self.supabase.anon_key = Some(v);
        }

        // Stripe overrides
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_SIGNATURE_TOLERANCE_SECS") {
            self.stripe.signature_tolerance_secs = v.parse().unwrap_or(self.stripe.signature_tolerance_secs);
        }

        // CORS overrides
        if let Ok(v) = env::var("CORS_ALLOW_METHODS") {
            self.cors.allow_methods = split_list(&v);
        }
        if let Ok(v) = env::var("CORS_ALLOW_HEADERS") {
            self.cors.allow_headers = split_list(&v);
        }

        // Reminder overrides
        if let Ok(v) = env::var("REMINDER_APPOINTMENT_WINDOW_HOURS") {
            self.reminders.appointment_window_hours = v.parse().unwrap_or(self.reminders.appointment_window_hours);
        }
        if let Ok(v) = env::var("REMINDER_CONTRACT_WINDOW_DAYS") {
            self.reminders.contract_window_days = v.parse().unwrap_or(self.reminders.contract_window_days);
        }
        if let Ok(v) = env::var("REMINDER_QUOTE_FOLLOWUP_DAYS") {
            self.reminders.quote_followup_days = v.parse().unwrap_or(self.reminders.quote_followup_days);
        }

        self
    }

    /// Check the settings the selected backends cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Supabase {
            if self.supabase.url.is_empty() {
                return Err(ConfigError::Missing("SUPABASE_URL"));
            }
            if url::Url::parse(&self.supabase.url).is_err() {
                return Err(ConfigError::Invalid("SUPABASE_URL"));
            }
            if self.supabase.service_role_key.is_empty() {
                return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"));
            }
        }
        let prefix = &self.server.route_prefix;
        if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Invalid("ROUTE_PREFIX"));
        }
        if self.stripe.signature_tolerance_secs < 0 {
            return Err(ConfigError::Invalid("STRIPE_SIGNATURE_TOLERANCE_SECS"));
        }
        self.reminders.appointment_window()?;
        self.reminders.contract_window()?;
        self.reminders.quote_followup()?;
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                route_prefix: "/api/notifications-enhanced".to_string(),
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            store: StoreConfig {
                backend: StoreBackend::Supabase,
            },
            supabase: SupabaseConfig::default(),
            stripe: StripeConfig {
                webhook_secret: String::new(),
                signature_tolerance_secs: 300,
            },
            cors: CorsConfig::notifications_api(),
            reminders: ReminderConfig::standard(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                route_prefix: "/api/notifications-enhanced".to_string(),
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            ..Self::development()
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                route_prefix: "/api/notifications-enhanced".to_string(),
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            ..Self::development()
        }
    }
}

impl CorsConfig {
    pub fn notifications_api() -> Self {
        Self {
            allow_methods: split_list("GET, POST, PUT, DELETE, OPTIONS"),
            allow_headers: split_list("Content-Type, Authorization, stripe-signature"),
        }
    }
}

// Longest window any reminder job may scan
const MAX_REMINDER_WINDOW_DAYS: i64 = 366;

impl ReminderConfig {
    pub fn standard() -> Self {
        Self {
            appointment_window_hours: 24,
            contract_window_days: 30,
            quote_followup_days: 3,
        }
    }

    pub fn appointment_window(&self) -> Result<Duration, ConfigError> {
        reminder_window(
            Duration::try_hours(self.appointment_window_hours),
            "REMINDER_APPOINTMENT_WINDOW_HOURS",
        )
    }

    pub fn contract_window(&self) -> Result<Duration, ConfigError> {
        reminder_window(Duration::try_days(self.contract_window_days), "REMINDER_CONTRACT_WINDOW_DAYS")
    }

    pub fn quote_followup(&self) -> Result<Duration, ConfigError> {
        reminder_window(Duration::try_days(self.quote_followup_days), "REMINDER_QUOTE_FOLLOWUP_DAYS")
    }
}

/// Windows must be positive and at most a year
fn reminder_window(window: Option<Duration>, key: &'static str) -> Result<Duration, ConfigError> {
    window
        .filter(|w| *w > Duration::zero() && *w <= Duration::days(MAX_REMINDER_WINDOW_DAYS))
        .ok_or(ConfigError::Invalid(key))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Process-wide config for the binaries; library code takes AppConfig by reference
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.route_prefix, "/api/notifications-enhanced");
        assert_eq!(config.stripe.signature_tolerance_secs, 300);
        assert_eq!(config.reminders.appointment_window_hours, 24);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.max_request_size_bytes, 2 * 1024 * 1024);
        assert_eq!(config.cors.allow_headers, vec!["Content-Type", "Authorization", "stripe-signature"]);
    }

    #[test]
    fn supabase_backend_requires_url_and_key() {
        let mut config = AppConfig::development();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SUPABASE_URL"))));

        config.supabase.url = "https://project.supabase.co".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))));

        config.supabase.service_role_key = "service-key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn memory_backend_needs_no_supabase_settings() {
        let mut config = AppConfig::development();
        config.store.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn root_route_prefix_is_invalid() {
        let mut config = AppConfig::development();
        config.store.backend = StoreBackend::Memory;
        config.server.route_prefix = "/".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("ROUTE_PREFIX"))));
    }

    #[test]
    fn env_overrides_replace_preset_values() {
        env::set_var("ROUTE_PREFIX", "/api/v2/notifications");
        env::set_var("STRIPE_SIGNATURE_TOLERANCE_SECS", "not-a-number");
        env::set_var("CORS_ALLOW_HEADERS", "Content-Type,Authorization");
        let config = AppConfig::development().with_env_overrides();
        env::remove_var("ROUTE_PREFIX");
        env::remove_var("STRIPE_SIGNATURE_TOLERANCE_SECS");
        env::remove_var("CORS_ALLOW_HEADERS");

        assert_eq!(config.server.route_prefix, "/api/v2/notifications");
        // Unparseable numbers keep the preset
        assert_eq!(config.stripe.signature_tolerance_secs, 300);
        assert_eq!(config.cors.allow_headers, vec!["Content-Type", "Authorization"]);
    }

    #[test]
    fn reminder_windows_must_be_positive_and_bounded() {
        let mut config = AppConfig::development();
        config.store.backend = StoreBackend::Memory;
        assert_eq!(config.reminders.appointment_window().unwrap(), Duration::hours(24));

        config.reminders.appointment_window_hours = i64::MAX / 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("REMINDER_APPOINTMENT_WINDOW_HOURS"))
        ));

        config.reminders = ReminderConfig::standard();
        config.reminders.contract_window_days = -30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("REMINDER_CONTRACT_WINDOW_DAYS"))));

        config.reminders = ReminderConfig::standard();
        config.reminders.quote_followup_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("REMINDER_QUOTE_FOLLOWUP_DAYS"))));
    }

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(split_list("GET, ,POST,"), vec!["GET", "POST"]);
    }
}
