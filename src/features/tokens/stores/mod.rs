mod token_store;

#[cfg(test)]
pub use token_store::{InMemoryRefreshTokenStore, InMemoryTokenBlacklistStore};
pub use token_store::{
    PgRefreshTokenStore, PgTokenBlacklistStore, RefreshTokenStore, TokenBlacklistStore,
};
