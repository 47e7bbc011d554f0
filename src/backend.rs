use crate::{
    plan::QueryPlan,
    projection::{ItemRecord, StoredItem},
    Error, Page, Result, Search,
};
use serde_json::{Map, Value};
use stac::{Collection, Item};
use tracing::{info, warn};

/// A store of collections and items.
///
/// Implementors provide the storage primitives. The public operations
/// (adding items, searching, ...) are provided on top of them, so every
/// backend compiles searches and projects geometries the same way.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Returns true if a collection with this id exists.
    async fn collection_exists(&self, id: &str) -> Result<bool>;

    /// Stores a collection document, returning false if the id is taken.
    async fn insert_collection(&self, id: &str, data: Value) -> Result<bool>;

    /// Fetches a collection document.
    async fn fetch_collection(&self, id: &str) -> Result<Option<Value>>;

    /// Removes a collection and its items, returning false if it didn't exist.
    async fn remove_collection(&self, id: &str) -> Result<bool>;

    /// Stores an item and its geometry in one write, returning false if the
    /// item already exists.
    async fn insert_item(&self, record: &ItemRecord) -> Result<bool>;

    /// Replaces an item's document and geometry in one write, returning
    /// false if there was no such item.
    async fn replace_item(&self, record: &ItemRecord) -> Result<bool>;

    /// Removes an item, returning false if there was no such item.
    async fn remove_item(&self, id: &str, collection: &str) -> Result<bool>;

    /// Runs a compiled search.
    async fn query(&self, plan: &QueryPlan) -> Result<Vec<StoredItem>>;

    /// Adds a collection.
    async fn add_collection(&self, collection: Collection) -> Result<()> {
        let id = collection.id.clone();
        let data = serde_json::to_value(collection)?;
        if self.insert_collection(&id, data).await? {
            info!(collection = %id, "added collection");
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "collection {} already exists",
                id
            )))
        }
    }

    /// Fetches a collection by id.
    async fn collection(&self, id: &str) -> Result<Option<Collection>> {
        self.fetch_collection(id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Deletes a collection and all of its items.
    async fn delete_collection(&self, id: &str) -> Result<()> {
        if self.remove_collection(id).await? {
            info!(collection = %id, "deleted collection");
            Ok(())
        } else {
            Err(Error::NotFound(format!("collection {} does not exist", id)))
        }
    }

    /// Adds an item to its collection.
    ///
    /// The item's geometry is projected into the store in the same write as
    /// its document. Nothing is written if the collection doesn't exist or
    /// the geometry is invalid.
    async fn add_item(&self, item: Item) -> Result<()> {
        let record = ItemRecord::from_item(item)?;
        if !self.collection_exists(&record.collection).await? {
            warn!(item = %record.id, collection = %record.collection, "collection does not exist");
            return Err(Error::NotFound(format!(
                "collection {} does not exist",
                record.collection
            )));
        }
        if self.insert_item(&record).await? {
            info!(item = %record.id, collection = %record.collection, "added item");
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "item {} already exists in collection {}",
                record.id, record.collection
            )))
        }
    }

    /// Replaces an item, re-deriving its geometry.
    ///
    /// The item's id and collection identify which item to replace.
    async fn update_item(&self, item: Item) -> Result<()> {
        let record = ItemRecord::from_item(item)?;
        if self.replace_item(&record).await? {
            info!(item = %record.id, collection = %record.collection, "updated item");
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "item {} does not exist in collection {}",
                record.id, record.collection
            )))
        }
    }

    /// Deletes an item.
    async fn delete_item(&self, id: &str, collection: &str) -> Result<()> {
        if self.remove_item(id, collection).await? {
            info!(item = %id, collection = %collection, "deleted item");
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "item {} does not exist in collection {}",
                id, collection
            )))
        }
    }

    /// Fetches an item.
    async fn item(&self, id: &str, collection: &str) -> Result<Option<Map<String, Value>>> {
        let search = Search {
            ids: vec![id.to_string()],
            collections: vec![collection.to_string()],
            limit: Some(1),
            ..Default::default()
        };
        self.query(&search.compile()?)
            .await?
            .into_iter()
            .next()
            .map(StoredItem::into_feature)
            .transpose()
    }

    /// Lists the items in one collection.
    async fn items(&self, collection: &str, limit: Option<i64>) -> Result<Page> {
        let search = Search {
            collections: vec![collection.to_string()],
            limit,
            ..Default::default()
        };
        let mut page = self.search(search).await?;
        page.collection = Some(collection.to_string());
        Ok(page)
    }

    /// Searches for items.
    async fn search(&self, search: Search) -> Result<Page> {
        let plan = search.compile()?;
        let features = self
            .query(&plan)
            .await?
            .into_iter()
            .map(StoredItem::into_feature)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(features, plan.limit))
    }
}
