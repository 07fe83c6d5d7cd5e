use anyhow::{Context, Result};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub embedding_model: String,

    pub database_url: String,

    /// HS256 secret the identity provider signs session tokens with
    pub auth_jwt_secret: String,
    /// Identity provider base URL, needed only for staff invites
    pub auth_url: Option<String>,
    pub auth_service_key: Option<String>,

    /// Unset disables outbound email (notifications are logged and skipped)
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Testing mode: every email is delivered here instead of to the member
    pub email_override_recipient: Option<String>,

    pub kb_similarity_threshold: f64,
    pub kb_match_count: i32,

    /// Timezone used for "today"/"this week" and the date/time tool
    pub gym_timezone: Tz,

    pub langsmith_api_key: Option<String>,

    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            llm_api_url: std::env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY").context("LLM_API_KEY must be set")?,
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),

            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,

            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET")
                .context("AUTH_JWT_SECRET must be set")?,
            auth_url: std::env::var("AUTH_URL").ok().filter(|s| !s.is_empty()),
            auth_service_key: std::env::var("AUTH_SERVICE_KEY").ok().filter(|s| !s.is_empty()),

            resend_api_key: std::env::var("RESEND_API_KEY").ok().filter(|s| !s.is_empty()),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "onboarding@resend.dev".to_string()),
            email_override_recipient: std::env::var("EMAIL_OVERRIDE_RECIPIENT")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),

            kb_similarity_threshold: std::env::var("KB_SIMILARITY_THRESHOLD")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()
                .context("KB_SIMILARITY_THRESHOLD must be a number")?,
            kb_match_count: std::env::var("KB_MATCH_COUNT")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("KB_MATCH_COUNT must be an integer")?,

            gym_timezone: std::env::var("GYM_TIMEZONE")
                .unwrap_or_else(|_| "UTC".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GYM_TIMEZONE must be an IANA timezone"))?,

            langsmith_api_key: std::env::var("LANGSMITH_API_KEY").ok(),

            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("HTTP_PORT must be a valid port number")?,
        })
    }

    /// Whether staff invites can reach the identity provider
    pub fn invites_enabled(&self) -> bool {
        self.auth_url.is_some() && self.auth_service_key.is_some()
    }
}
