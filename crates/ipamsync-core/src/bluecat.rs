// ── Bluecat source adapter ──
//
// Bridges the Bluecat v1 client into the fetch engine.

use tracing::info;

use ipamsync_api::BluecatClient;

use crate::config::SourceConfig;
use crate::error::CoreError;
use crate::fetch::EntitySource;
use crate::model::{EntityId, EntityType, RawEntity};

impl EntitySource for BluecatClient {
    async fn fetch_entities(
        &self,
        parent_id: EntityId,
        object_type: EntityType,
        start: u32,
        count: u32,
    ) -> Result<Vec<RawEntity>, CoreError> {
        Ok(self
            .get_entities(parent_id.0, object_type.as_ref(), start, count)
            .await?)
    }

    fn fork(&self) -> Result<Self, CoreError> {
        Ok(BluecatClient::fork(self)?)
    }
}

/// Log in and resolve the configuration entity to walk from.
pub async fn connect_source(config: &SourceConfig) -> Result<(BluecatClient, EntityId), CoreError> {
    let transport = config.tls.transport(config.timeout);
    let mut client = BluecatClient::new(config.url.as_str(), transport)?;
    client.login(&config.username, &config.password).await?;

    let configuration = client
        .find_configuration(config.configuration.as_deref())
        .await
        .map_err(|e| match e {
            ipamsync_api::Error::Bluecat { status: 404, message } => CoreError::Config { message },
            other => other.into(),
        })?;

    let root = EntityId(configuration.id);
    info!(
        %root,
        configuration = configuration.name.as_deref().unwrap_or_default(),
        "connected to Bluecat"
    );
    Ok((client, root))
}
