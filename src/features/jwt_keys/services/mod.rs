mod jwt_key_service;

pub use jwt_key_service::{JwtKeyService, KeyRotationOutcome};
