use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Bounded optimistic-concurrency retry budget for reserve().
    pub max_reserve_attempts: u32,
    /// AI planner credits granted once per booking.
    pub ai_credit_amount: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Commission percentage applied when neither the trip nor the
    /// organizer carries an explicit rate.
    pub default_commission_rate: Decimal,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_reserve_attempts: 3,
            ai_credit_amount: 50,
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: Decimal::from(10),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.enabled", false)?
            .set_default("booking.max_reserve_attempts", 3)?
            .set_default("booking.ai_credit_amount", 50)?
            .set_default("settlement.default_commission_rate", "10")?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with JUNKET__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("JUNKET").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://junket.db".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_secret: "change-me-in-production".to_string(),
            },
            gateway: GatewayConfig::default(),
            booking: BookingConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }
}
