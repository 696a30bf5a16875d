use std::sync::Arc;

use async_trait::async_trait;
use serde_json_bytes::ByteString;
use tower::BoxError;

use super::ContextStage;
use super::StageInput;
use crate::auth::AuthResolver;
use crate::auth::CurrentUserMapper;
use crate::context::CURRENT_USER;
use crate::context::Context;
use crate::json_ext::Object;

/// Resolves the caller and merges `{ currentUser }` into the context.
///
/// Nothing is merged when the request carries no credentials.
pub(super) struct Authentication {
    resolver: Arc<dyn AuthResolver>,
    get_current_user: Option<CurrentUserMapper>,
}

impl Authentication {
    pub(super) fn new(
        resolver: Arc<dyn AuthResolver>,
        get_current_user: Option<CurrentUserMapper>,
    ) -> Self {
        Self {
            resolver,
            get_current_user,
        }
    }
}

#[async_trait]
impl ContextStage for Authentication {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn contribute(&self, input: &StageInput<'_>, context: &Context) -> Result<(), BoxError> {
        let Some(payload) = self.resolver.resolve(input.request, input.host).await? else {
            tracing::debug!("request carries no credentials");
            return Ok(());
        };

        let current_user = match &self.get_current_user {
            Some(mapper) => mapper.map(payload).await?,
            None => serde_json_bytes::to_value(&payload)?,
        };

        let mut carrier = Object::new();
        carrier.insert(ByteString::from(CURRENT_USER), current_user);
        context.extend(carrier);
        tracing::debug!("current user resolved");
        Ok(())
    }
}
