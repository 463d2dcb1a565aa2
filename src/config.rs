// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{DynStore, ReviewRepository},
    services::{
        campaign_service::{CampaignService, CampaignSettings},
        dispatcher::{Dispatcher, DynGateway},
        drip_service::DripService,
        inbound_service::InboundService,
        review_service::ReviewService,
        textgrid::{TextGridClient, DEFAULT_API_URL},
    },
};

/// Configuração lida do ambiente (.env em desenvolvimento).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub cron_secret: String,
    pub app_base_url: String,
    pub textgrid_account_sid: String,
    pub textgrid_auth_token: String,
    pub textgrid_api_url: String,
    pub textgrid_webhook_secret: Option<String>,
    pub bind_addr: String,
    pub sms_timeout: Duration,
    pub tick_interval: Duration,
    pub campaign_fanout: i64,
    pub drip_batch_size: i64,
    pub review_cooldown_days: i64,
    pub scheduler_enabled: bool,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} deve ser definida"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} inválida ({raw}): {e}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tick_secs: u64 = parsed("TICK_INTERVAL_SECS", 300)?;
        if tick_secs == 0 {
            anyhow::bail!("TICK_INTERVAL_SECS deve ser maior que zero");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            cron_secret: required("CRON_SECRET")?,
            app_base_url: optional("APP_BASE_URL").unwrap_or_default(),
            textgrid_account_sid: required("TEXTGRID_ACCOUNT_SID")?,
            textgrid_auth_token: required("TEXTGRID_AUTH_TOKEN")?,
            textgrid_api_url: optional("TEXTGRID_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            textgrid_webhook_secret: optional("TEXTGRID_WEBHOOK_SECRET"),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            sms_timeout: Duration::from_secs(parsed("SMS_TIMEOUT_SECS", 10)?),
            tick_interval: Duration::from_secs(tick_secs),
            campaign_fanout: parsed("CAMPAIGN_FANOUT", 10)?,
            drip_batch_size: parsed("DRIP_BATCH_SIZE", 50)?,
            review_cooldown_days: parsed("REVIEW_COOLDOWN_DAYS", 90)?,
            scheduler_enabled: parsed("SCHEDULER_ENABLED", false)?,
        })
    }

    /// Ticks por hora, usado no orçamento por campanha.
    pub fn ticks_per_hour(&self) -> u32 {
        (3600 / self.tick_interval.as_secs().max(1)).max(1) as u32
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub review_service: ReviewService,
    pub campaign_service: CampaignService,
    pub drip_service: DripService,
    pub inbound_service: InboundService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let gateway = TextGridClient::new(
            &config.textgrid_account_sid,
            &config.textgrid_auth_token,
            &config.textgrid_api_url,
        )?;

        let store: DynStore = Arc::new(ReviewRepository::new(db_pool.clone()));
        let mut state = Self::from_parts(config, store, Arc::new(gateway));
        state.db_pool = Some(db_pool);
        Ok(state)
    }

    /// Monta o grafo de serviços sobre um store e um gateway quaisquer.
    pub fn from_parts(config: AppConfig, store: DynStore, gateway: DynGateway) -> Self {
        let dispatcher = Dispatcher::new(gateway, store.clone(), config.sms_timeout, config.app_base_url.clone());
        let review_service = ReviewService::new(store.clone(), dispatcher, config.review_cooldown_days);
        let campaign_service = CampaignService::new(
            store.clone(),
            review_service.clone(),
            CampaignSettings {
                fanout: config.campaign_fanout,
                ticks_per_hour: config.ticks_per_hour(),
            },
        );
        let drip_service = DripService::new(store.clone(), review_service.clone(), config.drip_batch_size);
        let inbound_service = InboundService::new(store, review_service.clone());

        Self {
            config: Arc::new(config),
            db_pool: None,
            review_service,
            campaign_service,
            drip_service,
            inbound_service,
        }
    }
}
