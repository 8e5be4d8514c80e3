use std::sync::Arc;

use chrono::Utc;

use crate::core::error::Result;
use crate::features::tokens::stores::{RefreshTokenStore, TokenBlacklistStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCleanupSummary {
    pub refresh_tokens: u64,
    pub blacklist_entries: u64,
}

impl TokenCleanupSummary {
    pub fn total(&self) -> u64 {
        self.refresh_tokens + self.blacklist_entries
    }
}

pub struct TokenCleanupService {
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    blacklist: Arc<dyn TokenBlacklistStore>,
}

impl TokenCleanupService {
    pub fn new(
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        blacklist: Arc<dyn TokenBlacklistStore>,
    ) -> Self {
        Self {
            refresh_tokens,
            blacklist,
        }
    }

    /// Delete expired refresh tokens, then expired blacklist entries
    pub async fn cleanup_expired_tokens(&self) -> Result<TokenCleanupSummary> {
        let now = Utc::now();
        tracing::info!("Starting token cleanup at {}", now);

        let expired_refresh = self.refresh_tokens.find_expired_tokens(now).await?;
        let refresh_tokens = self.refresh_tokens.delete_all(&expired_refresh).await?;
        tracing::info!("Deleted {} expired refresh tokens", refresh_tokens);

        let expired_blacklist = self.blacklist.find_expired_tokens(now).await?;
        let blacklist_entries = self.blacklist.delete_all(&expired_blacklist).await?;
        tracing::info!("Deleted {} expired blacklist tokens", blacklist_entries);

        let summary = TokenCleanupSummary {
            refresh_tokens,
            blacklist_entries,
        };
        tracing::info!(
            "Token cleanup completed. Total deleted: {} tokens",
            summary.total()
        );
        Ok(summary)
    }
}
