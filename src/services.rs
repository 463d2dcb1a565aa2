// src/services.rs

pub mod campaign_service;
pub mod classifier;
pub mod dispatcher;
pub mod drip_service;
pub mod inbound_service;
pub mod review_service;
pub mod scheduler;
pub mod templates;
pub mod textgrid;
