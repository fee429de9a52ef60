use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub media_root: String,
    pub templates_dir: String,
    pub posts_per_page: u32,
    pub index_cache_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `DATABASE_URL` alone, for commands that only touch the database.
    pub fn database_url_from_env() -> anyhow::Result<String> {
        dotenvy::dotenv().ok();
        Self::database_url_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn database_url_from_lookup<F>(lookup: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "127.0.0.1");
        let port = var("PORT", "8080")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;
        let database_url = Self::database_url_from_lookup(&lookup)?;
        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let session_ttl_hours = var("SESSION_TTL_HOURS", "24")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SESSION_TTL_HOURS: {}", e))?;
        let cookie_secure = matches!(
            var("COOKIE_SECURE", "false").to_lowercase().as_str(),
            "1" | "true" | "yes"
        );
        let media_root = var("MEDIA_ROOT", "media");
        let templates_dir = var(
            "TEMPLATES_DIR",
            concat!(env!("CARGO_MANIFEST_DIR"), "/templates"),
        );
        let posts_per_page = var("POSTS_PER_PAGE", "10")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid POSTS_PER_PAGE: {}", e))?;
        if posts_per_page == 0 {
            anyhow::bail!("POSTS_PER_PAGE must be positive");
        }
        let index_cache_seconds = var("INDEX_CACHE_SECONDS", "20")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid INDEX_CACHE_SECONDS: {}", e))?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            session_ttl_hours,
            cookie_secure,
            media_root,
            templates_dir,
            posts_per_page,
            index_cache_seconds,
        })
    }
}
