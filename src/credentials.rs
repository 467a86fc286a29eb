//! Credential checks performed before any remote state is touched.

use crate::ai::AiProvider;
use crate::platform::Platform;

/// Classify an AI key by its prefix. `None` means the key belongs to no
/// supported provider.
pub fn classify_ai_key(key: &str) -> Option<AiProvider> {
    AiProvider::classify(key)
}

/// Probe the host once with the token. Any failure (401, network) is `false`.
pub async fn validate_remote_token(platform: &dyn Platform, token: &str) -> bool {
    match platform.authenticated_user(token).await {
        Ok(user) => {
            tracing::debug!(login = %user.login, "GitHub token is valid");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "GitHub token validation failed");
            false
        }
    }
}
