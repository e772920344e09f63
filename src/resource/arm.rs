//! ARM dispatch
//!
//! Maps the [`TableApi`] operations to Cosmos DB Resource Manager REST calls.

use super::api::{
    DatabaseAccount, Lookup, TableApi, TableCreateUpdateParameters, TableResource,
    ThroughputSettings,
};
use super::id::{AccountId, TableId};
use super::throughput::ThroughputSetting;
use crate::azure::client::AzureClient;
use crate::azure::error::ApiError;
use crate::azure::http::ApiResponse;
use crate::azure::operation::ArmOperation;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Cosmos DB management API version
pub const API_VERSION: &str = "2021-10-15";

/// [`TableApi`] over Azure Resource Manager
#[derive(Clone)]
pub struct ArmTableApi {
    client: AzureClient,
}

impl ArmTableApi {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AzureClient {
        &self.client
    }

    fn table_url(&self, id: &TableId) -> String {
        self.client.resource_url(&id.to_request_path(), API_VERSION)
    }

    fn throughput_url(&self, id: &TableId) -> String {
        self.client.resource_url(
            &format!("{}/throughputSettings/default", id.to_request_path()),
            API_VERSION,
        )
    }

    async fn lookup(&self, url: &str) -> Result<Lookup<ApiResponse>, ApiError> {
        Lookup::from_result(self.client.get(url).await)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct TableGetResults {
    id: Option<String>,
    properties: Option<TableGetProperties>,
}

#[derive(Deserialize)]
struct TableGetProperties {
    resource: Option<NamedResource>,
}

#[derive(Deserialize)]
struct NamedResource {
    id: Option<String>,
}

#[derive(Deserialize)]
struct DatabaseAccountGetResults {
    id: Option<String>,
    properties: Option<DatabaseAccountProperties>,
}

#[derive(Deserialize)]
struct DatabaseAccountProperties {
    #[serde(default)]
    capabilities: Vec<Capability>,
}

#[derive(Deserialize)]
struct Capability {
    name: String,
}

#[derive(Deserialize)]
struct ThroughputSettingsGetResults {
    properties: Option<ThroughputSettingsProperties>,
}

#[derive(Deserialize)]
struct ThroughputSettingsProperties {
    resource: Option<ThroughputResource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThroughputResource {
    throughput: Option<u32>,
    autoscale_settings: Option<AutoscaleResource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoscaleResource {
    max_throughput: Option<u32>,
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(body)?)
}

/// `throughput` or `autoscaleSettings`, as used by both create options and
/// throughput updates
fn throughput_body(setting: &ThroughputSetting) -> Value {
    match setting {
        ThroughputSetting::Fixed(throughput) => json!({ "throughput": throughput }),
        ThroughputSetting::Autoscale { max_throughput } => {
            json!({ "autoscaleSettings": { "maxThroughput": max_throughput } })
        },
        ThroughputSetting::Unset => json!({}),
    }
}

/// Request body of a table create/update
pub fn create_update_body(parameters: &TableCreateUpdateParameters) -> Value {
    json!({
        "properties": {
            "resource": { "id": parameters.name },
            "options": throughput_body(&parameters.throughput),
        }
    })
}

/// Request body of a throughput update
pub fn throughput_update_body(setting: &ThroughputSetting) -> Value {
    json!({
        "properties": {
            "resource": throughput_body(setting),
        }
    })
}

impl TableApi for ArmTableApi {
    type Operation = ArmOperation;

    fn subscription_id(&self) -> &str {
        &self.client.subscription_id
    }

    async fn get_table(&self, id: &TableId) -> Result<Lookup<TableResource>, ApiError> {
        let Lookup::Found(response) = self.lookup(&self.table_url(id)).await? else {
            return Ok(Lookup::Absent);
        };

        let table: TableGetResults = decode(response.body)?;
        Ok(Lookup::Found(TableResource {
            id: table.id,
            resource_id: table.properties.and_then(|p| p.resource).and_then(|r| r.id),
        }))
    }

    async fn create_update_table(
        &self,
        id: &TableId,
        parameters: &TableCreateUpdateParameters,
    ) -> Result<ArmOperation, ApiError> {
        tracing::info!("Creating or updating table {}", id);
        let response = self
            .client
            .put(&self.table_url(id), &create_update_body(parameters))
            .await?;
        Ok(ArmOperation::from_response(&self.client, &response))
    }

    async fn delete_table(&self, id: &TableId) -> Result<Lookup<ArmOperation>, ApiError> {
        tracing::info!("Deleting table {}", id);
        let response = Lookup::from_result(self.client.delete(&self.table_url(id)).await)?;
        Ok(response.map(|r| ArmOperation::from_response(&self.client, &r)))
    }

    async fn get_throughput(&self, id: &TableId) -> Result<Lookup<ThroughputSettings>, ApiError> {
        let Lookup::Found(response) = self.lookup(&self.throughput_url(id)).await? else {
            return Ok(Lookup::Absent);
        };

        let settings: ThroughputSettingsGetResults = decode(response.body)?;
        let resource = settings.properties.and_then(|p| p.resource);
        Ok(Lookup::Found(ThroughputSettings {
            throughput: resource.as_ref().and_then(|r| r.throughput),
            autoscale_max_throughput: resource
                .and_then(|r| r.autoscale_settings)
                .and_then(|a| a.max_throughput),
        }))
    }

    async fn update_throughput(
        &self,
        id: &TableId,
        setting: &ThroughputSetting,
    ) -> Result<Lookup<ArmOperation>, ApiError> {
        tracing::info!("Updating throughput of table {} to {:?}", id, setting);
        let response = Lookup::from_result(
            self.client
                .put(&self.throughput_url(id), &throughput_update_body(setting))
                .await,
        )?;
        Ok(response.map(|r| ArmOperation::from_response(&self.client, &r)))
    }

    async fn get_account(&self, id: &AccountId) -> Result<Lookup<DatabaseAccount>, ApiError> {
        let url = self.client.resource_url(&id.to_request_path(), API_VERSION);
        let Lookup::Found(response) = self.lookup(&url).await? else {
            return Ok(Lookup::Absent);
        };

        let account: DatabaseAccountGetResults = decode(response.body)?;
        Ok(Lookup::Found(DatabaseAccount {
            id: account.id,
            capabilities: account
                .properties
                .map(|p| p.capabilities.into_iter().map(|c| c.name).collect())
                .unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_inlines_fixed_throughput() {
        let parameters =
            TableCreateUpdateParameters::new("tbl1").with_throughput(ThroughputSetting::Fixed(400));
        assert_eq!(
            create_update_body(&parameters),
            json!({
                "properties": {
                    "resource": { "id": "tbl1" },
                    "options": { "throughput": 400 }
                }
            })
        );
    }

    #[test]
    fn test_create_body_without_throughput_has_empty_options() {
        let body = create_update_body(&TableCreateUpdateParameters::new("tbl1"));
        assert_eq!(body["properties"]["options"], json!({}));
    }

    #[test]
    fn test_throughput_update_body_autoscale() {
        assert_eq!(
            throughput_update_body(&ThroughputSetting::Autoscale { max_throughput: 4000 }),
            json!({
                "properties": {
                    "resource": { "autoscaleSettings": { "maxThroughput": 4000 } }
                }
            })
        );
    }

    #[test]
    fn test_wire_types_tolerate_missing_properties() {
        let table: TableGetResults = decode(json!({ "id": "/x" })).unwrap();
        assert!(table.properties.is_none());

        let account: DatabaseAccountGetResults =
            decode(json!({ "id": "/a", "properties": {} })).unwrap();
        assert!(account.properties.unwrap().capabilities.is_empty());
    }
}
