pub mod jobs;
pub mod models;
pub mod services;
pub mod stores;

pub use services::TokenCleanupService;
pub use stores::{PgRefreshTokenStore, PgTokenBlacklistStore};
