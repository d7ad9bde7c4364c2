use serde::Deserialize;

/// Master-admin identity defined by configuration, never by storage.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminRealmConfig {
    pub master_email: String,
    pub master_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmscConfig {
    pub enabled: bool,
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub admin: AdminRealmConfig,
    pub smsc: SmscConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let admin = AdminRealmConfig {
            master_email: std::env::var("ADMIN_MASTER_EMAIL")?,
            master_password: std::env::var("ADMIN_MASTER_PASSWORD")?,
        };
        let smsc = SmscConfig {
            enabled: std::env::var("SMSC_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            login: std::env::var("SMSC_LOGIN").unwrap_or_default(),
            password: std::env::var("SMSC_PASSWORD").unwrap_or_default(),
        };
        Ok(Self {
            database_url,
            admin,
            smsc,
        })
    }
}
