use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    /// Emails promoted to admin the first time they authenticate.
    pub admin_emails: Vec<String>,
    pub typing_display_window_secs: i64,
    pub typing_gc_window_secs: i64,
    pub typing_sweep_interval_secs: u64,
    pub notification_interval_minutes: u64,
    pub notification_webhook_url: String,
    pub message_page_max: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            store_backend: StoreBackend::Memory,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: String::new(),
            admin_emails: Vec::new(),
            typing_display_window_secs: 10,
            typing_gc_window_secs: 30,
            typing_sweep_interval_secs: 15,
            notification_interval_minutes: 120,
            notification_webhook_url: String::new(),
            message_page_max: 100,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) if value.eq_ignore_ascii_case("supabase") => StoreBackend::Supabase,
            Ok(value) if value.eq_ignore_ascii_case("memory") => StoreBackend::Memory,
            Ok(value) => {
                warn!("Unknown STORE_BACKEND '{}', falling back to memory", value);
                StoreBackend::Memory
            }
            Err(_) => {
                warn!("STORE_BACKEND not set, using in-memory store");
                StoreBackend::Memory
            }
        };

        let config = Self {
            port: parse_or("PORT", defaults.port),
            store_backend,
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|raw| {
                    raw.split(',')
                        .map(|email| email.trim().to_lowercase())
                        .filter(|email| !email.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            typing_display_window_secs: parse_or(
                "TYPING_DISPLAY_WINDOW_SECS",
                defaults.typing_display_window_secs,
            ),
            typing_gc_window_secs: parse_or("TYPING_GC_WINDOW_SECS", defaults.typing_gc_window_secs),
            typing_sweep_interval_secs: parse_or(
                "TYPING_SWEEP_INTERVAL_SECS",
                defaults.typing_sweep_interval_secs,
            ),
            notification_interval_minutes: parse_or(
                "NOTIFICATION_INTERVAL_MINUTES",
                defaults.notification_interval_minutes,
            ),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").unwrap_or_default(),
            message_page_max: parse_or("MESSAGE_PAGE_MAX", defaults.message_page_max),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
        };

        store_ready && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    pub fn is_notification_webhook_configured(&self) -> bool {
        !self.notification_webhook_url.is_empty()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
