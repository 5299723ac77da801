//! Common test utilities

use mockito::{Server, ServerGuard};
use synap_cache::{CacheConfig, HashCommandGeneration, SynapCache};

/// Create a mock store server for testing
#[allow(dead_code)] // Used by other test modules
pub async fn create_mock_server() -> ServerGuard {
    Server::new_async().await
}

/// Setup a cache client pointing to a mock server.
///
/// The hash-command generation is fixed so no probe request is issued.
#[allow(dead_code)] // Used by other test modules
pub async fn setup_test_cache() -> (SynapCache, ServerGuard) {
    let server = create_mock_server().await;
    let config = CacheConfig::new(server.url())
        .with_timeout(std::time::Duration::from_secs(5))
        .with_hash_command_generation(HashCommandGeneration::Modern);
    let cache = SynapCache::connect(config).await.unwrap();
    (cache, server)
}
