mod jwt_key;

pub use jwt_key::JwtKey;
