use async_trait::async_trait;
use tower::BoxError;

use super::ContextObserver;
use crate::json_ext::Object;

/// Logs the keys of every built context at `debug` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[async_trait]
impl ContextObserver for TracingObserver {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn observe(&self, snapshot: &Object) -> Result<(), BoxError> {
        let keys: Vec<&str> = snapshot.keys().map(|key| key.as_str()).collect();
        tracing::debug!(?keys, "context built");
        Ok(())
    }
}
