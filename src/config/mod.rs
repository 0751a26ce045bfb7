use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::LocalClock;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
}

// Настройки REST API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_seconds: u64,
}

// Настройки бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub search_debounce_ms: u64,
    pub catalog_refresh_minutes: u64,
    pub utc_offset_minutes: i32,
    pub page_size: u32,
}

impl BookingConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn catalog_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_refresh_minutes * 60)
    }

    pub fn local_clock(&self) -> Result<LocalClock, ConfigError> {
        LocalClock::from_offset_minutes(self.utc_offset_minutes).ok_or(ConfigError::Invalid {
            key: "UTC_OFFSET_MINUTES",
            value: self.utc_offset_minutes.to_string(),
        })
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 300,
            catalog_refresh_minutes: 30,
            utc_offset_minutes: 0,
            page_size: 20,
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();
        let config = Config {
            app: AppConfig {
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "booking_console=debug".to_string()),
            },
            api: ApiConfig {
                base_url: required("API_BASE_URL")?,
                token: required("API_TOKEN")?,
                timeout_seconds: parsed_or("API_TIMEOUT_SECONDS", 30)?,
            },
            booking: BookingConfig {
                search_debounce_ms: parsed_or("SEARCH_DEBOUNCE_MS", defaults.search_debounce_ms)?,
                catalog_refresh_minutes: parsed_or(
                    "CATALOG_REFRESH_MINUTES",
                    defaults.catalog_refresh_minutes,
                )?,
                utc_offset_minutes: parsed_or("UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?,
                page_size: parsed_or("PAGE_SIZE", defaults.page_size)?,
            },
        };
        config.booking.local_clock()?;
        Ok(config)
    }

    /// Файл настроек (TOML/JSON/YAML по расширению) + переопределения
    /// из окружения вида `BOOKING__API__TOKEN`.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("app.environment", "development")?
            .set_default("app.rust_log", "booking_console=debug")?
            .set_default("api.timeout_seconds", 30_i64)?
            .set_default("booking.search_debounce_ms", 300_i64)?
            .set_default("booking.catalog_refresh_minutes", 30_i64)?
            .set_default("booking.utc_offset_minutes", 0_i64)?
            .set_default("booking.page_size", 20_i64)?
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("BOOKING").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.booking.local_clock()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_defaults_match_console_behaviour() {
        let booking = BookingConfig::default();
        assert_eq!(booking.search_debounce(), Duration::from_millis(300));
        assert_eq!(booking.catalog_refresh_interval(), Duration::from_secs(30 * 60));
        assert!(booking.local_clock().is_ok());
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let booking = BookingConfig { utc_offset_minutes: 25 * 60, ..BookingConfig::default() };
        assert!(matches!(booking.local_clock(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn file_config_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("booking-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("console.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://club.example/api\"\ntoken = \"secret\"\n\n[booking]\nutc_offset_minutes = 180\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.api.base_url, "https://club.example/api");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.booking.search_debounce_ms, 300);
        assert_eq!(config.booking.utc_offset_minutes, 180);

        std::fs::remove_dir_all(dir).ok();
    }
}
