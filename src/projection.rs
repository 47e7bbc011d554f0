//! Moves item geometries between GeoJSON and the store.
//!
//! On write, the geometry column is derived from the item's `geometry`
//! field. On read, the store renders its geometry back to GeoJSON, which
//! replaces the payload's `geometry` in the returned feature.

use crate::{Error, Geometry, Result};
use serde_json::{Map, Value};
use stac::Item;

/// An item ready to be written.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemRecord {
    /// The item id.
    pub id: String,

    /// The owning collection id.
    pub collection: String,

    /// The full item document.
    pub data: Value,

    /// The item geometry as canonical GeoJSON text, ready for the store's
    /// geometry constructor.
    pub geometry: String,
}

/// An item as read back from a store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredItem {
    /// The item id.
    pub id: String,

    /// The owning collection id.
    pub collection: String,

    /// The full item document.
    pub data: Value,

    /// The stored geometry rendered as GeoJSON text by the store.
    pub geometry: Option<String>,
}

impl ItemRecord {
    /// Creates a record from a STAC item.
    ///
    /// The item must have a collection and a valid geometry.
    pub fn from_item(item: Item) -> Result<ItemRecord> {
        let collection = item
            .collection
            .clone()
            .ok_or_else(|| Error::Validation(format!("item {} has no collection", item.id)))?;
        let id = item.id.clone();
        let data = serde_json::to_value(item)?;
        ItemRecord::new(id, collection, data)
    }

    /// Creates a record from an item document, deriving its geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use stac_postgis::ItemRecord;
    ///
    /// let data = json!({
    ///     "id": "an-id",
    ///     "geometry": {"type": "Point", "coordinates": [-105.1019, 40.1672, 1600.0]}
    /// });
    /// let record = ItemRecord::new("an-id", "collection-id", data).unwrap();
    /// assert!(record.geometry.contains("Point"));
    /// ```
    pub fn new(
        id: impl ToString,
        collection: impl ToString,
        data: Value,
    ) -> Result<ItemRecord> {
        let id = id.to_string();
        let geometry = match data.get("geometry") {
            Some(geometry) if !geometry.is_null() => Geometry::from_json_value(geometry)?,
            _ => return Err(Error::Decode(format!("item {} has no geometry", id))),
        };
        Ok(ItemRecord {
            id,
            collection: collection.to_string(),
            data,
            geometry: geometry.to_geojson_string()?,
        })
    }
}

impl StoredItem {
    /// Converts this stored item into a render-ready feature.
    pub fn into_feature(self) -> Result<Map<String, Value>> {
        let mut feature = match self.data {
            Value::Object(map) => map,
            _ => {
                return Err(Error::Programming(format!(
                    "stored item {} in {} is not a JSON object",
                    self.id, self.collection
                )))
            }
        };
        if let Some(text) = self.geometry {
            let geometry: geojson::Geometry = serde_json::from_str(&text).map_err(|err| {
                Error::Programming(format!("store rendered invalid GeoJSON: {}", err))
            })?;
            let _ = feature.insert("geometry".to_string(), serde_json::to_value(geometry)?);
        }
        Ok(feature)
    }
}
