use async_trait::async_trait;

/// Key-value cache seam. Callers hold it as `Option<Arc<dyn Cache>>` and
/// must behave the same when it is absent.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
}

/// Placeholder backend: never stores anything.
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
        Ok(())
    }
}
