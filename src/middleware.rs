// src/middleware.rs

pub mod cron;
pub mod tenancy;
