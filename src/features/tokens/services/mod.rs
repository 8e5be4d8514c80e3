mod token_cleanup_service;

pub use token_cleanup_service::{TokenCleanupService, TokenCleanupSummary};
