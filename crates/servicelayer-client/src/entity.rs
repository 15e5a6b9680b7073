//! Queries bound to an entity set.

use reqwest::Response;
use servicelayer_query::{Literal, ODataQuery};

use crate::client::ServiceLayerClient;
use crate::error::Result;

/// An entity set name plus the query to run against it.
///
/// ```rust,no_run
/// use servicelayer_client::{EntityQuery, ServiceLayerClient};
/// use servicelayer_query::ODataQuery;
///
/// # async fn example(client: &mut ServiceLayerClient) -> servicelayer_client::Result<()> {
/// let open_orders = EntityQuery::new("Orders")
///     .with_query(ODataQuery::new().where_eq("DocumentStatus", "bost_Open").top(20))
///     .run(client)
///     .await?;
///
/// let item = EntityQuery::new("Items").find(client, "A001").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    entity: String,
    query: ODataQuery,
}

impl EntityQuery {
    /// Query with no options against `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            query: ODataQuery::new(),
        }
    }

    /// Replace the query options.
    #[must_use]
    pub fn with_query(mut self, query: ODataQuery) -> Self {
        self.query = query;
        self
    }

    /// Entity set name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Query options.
    pub fn query(&self) -> &ODataQuery {
        &self.query
    }

    /// Path addressing a single record, e.g. `Items('A001')` or `Orders(12)`.
    pub fn key_path(&self, id: impl Into<Literal>) -> String {
        format!("{}({})", self.entity, id.into())
    }

    /// `GET` the entity set with the query options.
    ///
    /// # Errors
    ///
    /// See [`ServiceLayerClient::send`].
    pub async fn run(&self, client: &mut ServiceLayerClient) -> Result<Response> {
        client.odata_query(&self.entity, &self.query).await
    }

    /// `GET` one record by key, with the query options (typically `$select`).
    ///
    /// # Errors
    ///
    /// See [`ServiceLayerClient::send`].
    pub async fn find(
        &self,
        client: &mut ServiceLayerClient,
        id: impl Into<Literal>,
    ) -> Result<Response> {
        client
            .get_with(&self.key_path(id), &self.query)
            .await
    }
}
