mod refresh_token;
mod token_blacklist;

pub use refresh_token::RefreshToken;
pub use token_blacklist::TokenBlacklist;
