// src/services/scheduler.rs

// Loop interno opcional. Em produção os ticks normalmente vêm do cron HTTP.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::services::{campaign_service::CampaignService, drip_service::DripService};

pub fn spawn(campaigns: CampaignService, drips: DripService, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        // Um tick atrasado não deve gerar rajada de envios.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_secs = every.as_secs(), "⏱️ Scheduler interno ativo");

        loop {
            ticker.tick().await;

            if let Err(e) = campaigns.process_tick().await {
                tracing::error!(error = %e, "Tick de campanhas falhou");
            }
            if let Err(e) = drips.process_tick().await {
                tracing::error!(error = %e, "Tick de drip falhou");
            }
        }
    })
}
