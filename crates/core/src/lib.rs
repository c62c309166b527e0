pub mod domain;
pub mod feed;
pub mod recommend;
pub mod storage;
pub mod sync;

pub mod config {

    const DEFAULT_FEED_BASE_URL: &str = "https://api.stockapi.com/v1/stocks";
    const DEFAULT_PORT: u16 = 8000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub db_host: String,
        pub db_port: u16,
        pub db_user: String,
        pub db_password: String,
        pub db_name: String,
        pub db_ssl_mode: String,
        pub feed_base_url: String,
        pub feed_auth_token: String,
        pub sentry_dsn: Option<String>,
        pub port: u16,
        pub sync_on_startup: bool,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                db_host: "localhost".to_string(),
                db_port: 5432,
                db_user: "postgres".to_string(),
                db_password: String::new(),
                db_name: "ratingscope".to_string(),
                db_ssl_mode: "disable".to_string(),
                feed_base_url: DEFAULT_FEED_BASE_URL.to_string(),
                feed_auth_token: String::new(),
                sentry_dsn: None,
                port: DEFAULT_PORT,
                sync_on_startup: false,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                db_host: var_or("DB_HOST", defaults.db_host),
                db_port: parsed_var_or("DB_PORT", defaults.db_port),
                db_user: var_or("DB_USER", defaults.db_user),
                db_password: var_or("DB_PASSWORD", defaults.db_password),
                db_name: var_or("DB_NAME", defaults.db_name),
                db_ssl_mode: var_or("DB_SSL_MODE", defaults.db_ssl_mode),
                feed_base_url: var_or("FEED_BASE_URL", defaults.feed_base_url),
                feed_auth_token: var_or("FEED_AUTH_TOKEN", defaults.feed_auth_token),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                port: parsed_var_or("PORT", defaults.port),
                sync_on_startup: std::env::var("SYNC_ON_STARTUP")
                    .map(|v| v.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            })
        }

        /// `DATABASE_URL` when set, otherwise a URL assembled from the `DB_*` parts.
        pub fn database_url(&self) -> String {
            if let Some(url) = &self.database_url {
                return url.clone();
            }
            let credentials = if self.db_password.is_empty() {
                self.db_user.clone()
            } else {
                format!("{}:{}", self.db_user, self.db_password)
            };
            format!(
                "postgresql://{credentials}@{}:{}/{}?sslmode={}",
                self.db_host, self.db_port, self.db_name, self.db_ssl_mode
            )
        }

        pub fn feed_credentials_configured(&self) -> bool {
            !self.feed_auth_token.trim().is_empty() && !self.feed_base_url.trim().is_empty()
        }
    }

    /// Masks a secret for log output, keeping only its edges.
    pub fn mask_secret(secret: &str) -> String {
        let chars: Vec<char> = secret.chars().collect();
        if chars.len() <= 8 {
            return "***".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn var_or(key: &str, default: String) -> String {
        std::env::var(key).unwrap_or(default)
    }

    fn parsed_var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

}
