pub mod review_repo;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use review_repo::ReviewRepository;
pub use store::{DynStore, EligibilityQuery};
