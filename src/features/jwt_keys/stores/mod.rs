mod jwt_key_store;

#[cfg(test)]
pub use jwt_key_store::InMemoryJwtKeyStore;
pub use jwt_key_store::{JwtKeyStore, PgJwtKeyStore};
