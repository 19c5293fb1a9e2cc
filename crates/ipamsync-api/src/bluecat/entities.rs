// Bluecat entity browsing
//
// `getEntities` lists the children of one parent, filtered to one object
// type, one page at a time (`start` offset + `count` page size).

use tracing::debug;

use crate::bluecat::client::BluecatClient;
use crate::bluecat::models::ApiEntity;
use crate::error::Error;

/// Object type string of the configuration entities hanging off the root.
pub const CONFIGURATION_TYPE: &str = "Configuration";

impl BluecatClient {
    /// List one page of children of `parent_id` with the given object type.
    pub async fn get_entities(
        &self,
        parent_id: u64,
        object_type: &str,
        start: u32,
        count: u32,
    ) -> Result<Vec<ApiEntity>, Error> {
        self.get(
            "getEntities",
            &[
                ("parentId", parent_id.to_string()),
                ("type", object_type.to_owned()),
                ("start", start.to_string()),
                ("count", count.to_string()),
            ],
        )
        .await
    }

    /// Fetch one entity by id. Returns `None` for unknown ids.
    pub async fn get_entity_by_id(&self, id: u64) -> Result<Option<ApiEntity>, Error> {
        let entity: ApiEntity = self.get("getEntityById", &[("id", id.to_string())]).await?;
        Ok((!entity.is_empty()).then_some(entity))
    }

    /// Resolve the configuration to walk.
    ///
    /// With a name, the configuration of that name; otherwise the first one
    /// the server lists.
    pub async fn find_configuration(&self, name: Option<&str>) -> Result<ApiEntity, Error> {
        let configurations = self.get_entities(0, CONFIGURATION_TYPE, 0, 100).await?;
        debug!(count = configurations.len(), "listed configurations");

        let found = match name {
            Some(wanted) => configurations
                .into_iter()
                .find(|c| c.name.as_deref() == Some(wanted)),
            None => configurations.into_iter().next(),
        };

        found.ok_or_else(|| Error::Bluecat {
            status: 404,
            message: match name {
                Some(wanted) => format!("configuration {wanted:?} not found"),
                None => "no configuration defined".into(),
            },
        })
    }
}
