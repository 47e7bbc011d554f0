use crate::{
    plan::QueryPlan,
    projection::{ItemRecord, StoredItem},
    sql::{self, Param},
    Backend, Result,
};
use serde_json::Value;
use tokio_postgres::{types::ToSql, GenericClient, Row};
use tracing::debug;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// A PostGIS client.
///
/// Items live in an `items` table with a `data` jsonb column holding the
/// full document and a `geometry` column derived from it. Use
/// [Client::migrate] to create the tables.
#[derive(Debug)]
pub struct Client<C>(C)
where
    C: GenericClient;

impl<C: GenericClient> Client<C> {
    /// Creates a new client.
    pub fn new(client: C) -> Client<C> {
        Client(client)
    }

    /// Returns this client's inner client.
    pub fn into_inner(self) -> C {
        self.0
    }

    /// Creates the PostGIS extension, tables, and indices if they don't exist.
    pub async fn migrate(&self) -> Result<()> {
        debug!("migrating schema");
        self.0.batch_execute(SCHEMA).await?;
        Ok(())
    }

    async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        debug!(statement, params = params.len(), "executing");
        self.0.execute(statement, params).await.map_err(Into::into)
    }

    async fn query_opt(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>> {
        debug!(statement, params = params.len(), "querying");
        self.0.query_opt(statement, params).await.map_err(Into::into)
    }
}

impl<C: GenericClient> Backend for Client<C> {
    async fn collection_exists(&self, id: &str) -> Result<bool> {
        let row = self
            .query_opt("SELECT 1 FROM collections WHERE id = $1", &[&id])
            .await?;
        Ok(row.is_some())
    }

    async fn insert_collection(&self, id: &str, data: Value) -> Result<bool> {
        let n = self
            .execute(
                "INSERT INTO collections (id, data) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
                &[&id, &data],
            )
            .await?;
        Ok(n > 0)
    }

    async fn fetch_collection(&self, id: &str) -> Result<Option<Value>> {
        let row = self
            .query_opt("SELECT data FROM collections WHERE id = $1", &[&id])
            .await?;
        row.map(|row| row.try_get("data"))
            .transpose()
            .map_err(Into::into)
    }

    async fn remove_collection(&self, id: &str) -> Result<bool> {
        let n = self
            .execute("DELETE FROM collections WHERE id = $1", &[&id])
            .await?;
        Ok(n > 0)
    }

    async fn insert_item(&self, record: &ItemRecord) -> Result<bool> {
        let statement = format!(
            "INSERT INTO items (id, collection, data, geometry) \
             VALUES ($1, $2, $3, ST_SetSRID(ST_GeomFromGeoJSON($4::text), {})) \
             ON CONFLICT (collection, id) DO NOTHING",
            sql::SRID
        );
        let n = self
            .execute(
                &statement,
                &[
                    &record.id,
                    &record.collection,
                    &record.data,
                    &record.geometry,
                ],
            )
            .await?;
        Ok(n > 0)
    }

    async fn replace_item(&self, record: &ItemRecord) -> Result<bool> {
        let statement = format!(
            "UPDATE items SET data = $3, geometry = ST_SetSRID(ST_GeomFromGeoJSON($4::text), {}) \
             WHERE id = $1 AND collection = $2",
            sql::SRID
        );
        let n = self
            .execute(
                &statement,
                &[
                    &record.id,
                    &record.collection,
                    &record.data,
                    &record.geometry,
                ],
            )
            .await?;
        Ok(n > 0)
    }

    async fn remove_item(&self, id: &str, collection: &str) -> Result<bool> {
        let n = self
            .execute(
                "DELETE FROM items WHERE id = $1 AND collection = $2",
                &[&id, &collection],
            )
            .await?;
        Ok(n > 0)
    }

    async fn query(&self, plan: &QueryPlan) -> Result<Vec<StoredItem>> {
        let (statement, params): (String, Vec<Param>) = plan.to_sql();
        debug!(statement = %statement, params = params.len(), "searching");
        let rows = self.0.query(&statement, &sql::as_params(&params)).await?;
        rows.iter()
            .map(|row| -> Result<StoredItem> {
                Ok(StoredItem {
                    id: row.try_get("id")?,
                    collection: row.try_get("collection")?,
                    data: row.try_get("data")?,
                    geometry: row.try_get("geometry")?,
                })
            })
            .collect()
    }
}
