#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub database_url: String,

    /// Telegram user ID of the single administrator
    pub admin_id: i64,

    /// Base URL of the mini-application
    pub webapp_url: String,
    /// Cache-busting version appended to the mini-app URL
    pub webapp_version: String,
    /// Bot handle used to build referral links
    pub bot_username: String,

    /// Directory holding the intro carousel images
    pub media_dir: String,

    pub http_host: String,
    pub http_port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://trashbot.db".to_string()),
            admin_id: std::env::var("ADMIN_ID")?.trim().parse()?,
            webapp_url: std::env::var("WEBAPP_URL")
                .unwrap_or_else(|_| "https://udveri-tariffs.vercel.app/".to_string()),
            webapp_version: std::env::var("WEBAPP_VERSION")
                .unwrap_or_else(|_| "2025-08-13-1".to_string()),
            bot_username: std::env::var("BOT_USERNAME")
                .unwrap_or_else(|_| "udveri_bot".to_string()),
            media_dir: std::env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string()),
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id == user_id
    }

    pub fn ref_link(&self, user_id: i64) -> String {
        format!("https://t.me/{}?start=ref_{}", self.bot_username, user_id)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        telegram_bot_token: "test-token".to_string(),
        database_url: "sqlite::memory:".to_string(),
        admin_id: 1000,
        webapp_url: "https://example.test/app/".to_string(),
        webapp_version: "test-1".to_string(),
        bot_username: "test_bot".to_string(),
        media_dir: "media".to_string(),
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_configured_admin_is_admin() {
        let config = test_config();
        assert!(config.is_admin(1000));
        assert!(!config.is_admin(1001));
    }

    #[test]
    fn ref_link_uses_bot_username() {
        let config = test_config();
        assert_eq!(config.ref_link(42), "https://t.me/test_bot?start=ref_42");
    }
}
