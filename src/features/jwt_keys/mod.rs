pub mod jobs;
pub mod models;
pub mod services;
pub mod stores;

pub use services::JwtKeyService;
pub use stores::{JwtKeyStore, PgJwtKeyStore};
