pub mod analytics;
pub mod campaign;
pub mod contact;
pub mod contractor;
pub mod review;
