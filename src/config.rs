use std::collections::HashSet;

use crate::errors::AppError;

/// Environment-driven runtime configuration. Everything here belongs to
/// external collaborators (CORS consumers, the email provider, reverse
/// proxies); core logic never reads the environment directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub blocked_ips: HashSet<String>,
    pub email: EmailConfig,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    pub reply_to: Option<String>,
    pub notify_address: String,
}

/// Origins that are always allowed, regardless of environment.
const FIXED_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
];

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8000);

        let mut cors_origins: Vec<String> =
            FIXED_CORS_ORIGINS.iter().map(|s| (*s).to_string()).collect();
        if let Ok(extra) = std::env::var("CORS_ORIGIN") {
            for origin in extra.split(',') {
                let origin = origin.trim();
                if !origin.is_empty() && !cors_origins.iter().any(|o| o == origin) {
                    cors_origins.push(origin.to_string());
                }
            }
        }

        let blocked_ips = std::env::var("BLOCKED_IPS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            port,
            cors_origins,
            blocked_ips,
            email: EmailConfig::from_env()?,
        })
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let enabled = std::env::var("EMAIL_ENABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let api_key = std::env::var("EMAIL_API_KEY").unwrap_or_default();
        if enabled && api_key.is_empty() {
            return Err(AppError::configuration(
                "EMAIL_API_KEY required when EMAIL_ENABLED is set",
            ));
        }

        Ok(Self {
            enabled,
            api_url: std::env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            api_key,
            from_address: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@example.com".to_string()),
            reply_to: std::env::var("EMAIL_REPLY_TO").ok(),
            notify_address: std::env::var("EMAIL_NOTIFY")
                .unwrap_or_else(|_| "ops@example.com".to_string()),
        })
    }
}
