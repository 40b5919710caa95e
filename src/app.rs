use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbConn, SqlxPostgresConnector};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::Requester as _;
use teloxide::Bot;
use url::Url;

use crate::services::web_code::{ReqwestTransport, DEFAULT_MIRRORS, DEFAULT_TIMEOUT};
use crate::services::WebCodeService;
use crate::settings::{SettingsConfig, SettingsSession};

pub type SettingsStorage = InMemStorage<SettingsSession>;

pub struct App {
    bot: Bot,
    bot_username: String,
    db: DatabaseConnection,
    settings_storage: Arc<SettingsStorage>,
    settings_config: SettingsConfig,
    web_code: Option<WebCodeService>,
}

#[derive(Deserialize, Debug)]
struct EnvConfig {
    telegram_bot_token: String,
    database_url: String,

    web_api_secret: Option<String>,
    web_mirrors: Option<String>,
    web_request_timeout_secs: Option<u64>,

    recovery_cutoff: Option<String>,
}

impl App {
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn settings_storage(&self) -> Arc<SettingsStorage> {
        Arc::clone(&self.settings_storage)
    }

    pub fn settings_config(&self) -> &SettingsConfig {
        &self.settings_config
    }

    /// `None` when the site secret is not configured
    pub fn web_code(&self) -> Option<&WebCodeService> {
        self.web_code.as_ref()
    }
}

async fn init_db(env: &EnvConfig) -> anyhow::Result<DbConn> {
    let options = PgConnectOptions::from_str(&env.database_url)?;

    let pool = sqlx::PgPool::connect_with(options)
        .await
        .context("Cannot connect DB")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Cannot migrate")?;

    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}

fn parse_mirrors(raw: Option<&str>) -> anyhow::Result<Vec<Url>> {
    let raw = raw.unwrap_or_default();

    let mirrors: Vec<&str> = if raw.trim().is_empty() {
        DEFAULT_MIRRORS.to_vec()
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|mirror| !mirror.is_empty())
            .collect()
    };

    mirrors
        .into_iter()
        .map(|mirror| Url::parse(mirror).with_context(|| format!("Bad web mirror {mirror}")))
        .collect()
}

fn init_web_code(env: &EnvConfig) -> anyhow::Result<Option<WebCodeService>> {
    let Some(secret) = env.web_api_secret.clone() else {
        return Ok(None);
    };

    if secret.is_empty() {
        return Ok(None);
    }

    let timeout = env
        .web_request_timeout_secs
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

    let mirrors = parse_mirrors(env.web_mirrors.as_deref())?;
    let transport = ReqwestTransport::new(timeout)?;

    Ok(Some(WebCodeService::new(mirrors, secret, transport)?))
}

fn init_settings_config(env: &EnvConfig) -> anyhow::Result<SettingsConfig> {
    let cutoff = match env.recovery_cutoff.as_deref() {
        Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw)
            .context("Cannot parse RECOVERY_CUTOFF")?
            .with_timezone(&Utc),
        _ => SettingsConfig::default_recovery_cutoff(),
    };

    Ok(SettingsConfig::new(cutoff))
}

impl App {
    pub async fn init() -> anyhow::Result<&'static Self> {
        tracing::trace!("Init application");
        let env: EnvConfig = envy::from_env()?;

        let bot = Bot::new(&env.telegram_bot_token);
        let bot_username = bot
            .get_me()
            .await
            .context("Cannot obtain bot info")?
            .username()
            .to_owned();

        let db = init_db(&env).await?;

        let web_code = init_web_code(&env).context("Cannot configure web code requester")?;

        if web_code.is_none() {
            tracing::warn!("WEB_API_SECRET is not set, /web is disabled");
        }

        let settings_config = init_settings_config(&env)?;

        // Global static to avoid passing Arc around every handler
        let app = Box::new(Self {
            bot,
            bot_username,
            db,
            settings_storage: InMemStorage::new(),
            settings_config,
            web_code,
        });

        let app = &*Box::leak(app);

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_default_when_unset() {
        let mirrors = parse_mirrors(None).unwrap();

        assert_eq!(
            mirrors.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://wiralis.ru/", "https://wiralis.online/"]
        );
    }

    #[test]
    fn mirrors_keep_given_order() {
        let mirrors = parse_mirrors(Some(" https://b.test , https://a.test,")).unwrap();

        assert_eq!(
            mirrors.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://b.test/", "https://a.test/"]
        );
    }

    #[test]
    fn bad_mirror_is_an_error() {
        assert!(parse_mirrors(Some("not a url")).is_err());
    }
}
