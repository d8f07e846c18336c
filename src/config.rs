use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub session_expiry_hours: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub cookie_secure: bool,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub completion_max_tokens: u32,
    /// Substitute a placeholder reply when the provider returns empty text.
    pub empty_completion_fallback: bool,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: var_or("SERVER_HOST", "127.0.0.1"),
            server_port: parse_var("SERVER_PORT", "8080")?,
            database_url: var_or("DATABASE_URL", "sqlite://krishna_gpt.db?mode=rwc"),
            session_expiry_hours: parse_var("SESSION_EXPIRY_HOURS", "168")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,
            db_min_connections: parse_var("DB_MIN_CONNECTIONS", "1")?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "60")?,
            cookie_secure: parse_var("COOKIE_SECURE", "false")?,
            openai_api_key: var_or("OPENAI_API_KEY", ""),
            openai_model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            completion_max_tokens: parse_var("COMPLETION_MAX_TOKENS", "1500")?,
            empty_completion_fallback: parse_var("EMPTY_COMPLETION_FALLBACK", "true")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            database_url: "sqlite::memory:".to_string(),
            session_expiry_hours: 168,
            db_max_connections: 1,
            db_min_connections: 1,
            request_timeout_secs: 60,
            cookie_secure: false,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            completion_max_tokens: 1500,
            empty_completion_fallback: true,
        }
    }
}
