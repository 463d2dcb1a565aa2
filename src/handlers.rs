// src/handlers.rs

pub mod campaigns;
pub mod cron;
pub mod reviews;
pub mod sms;
pub mod webhooks;
