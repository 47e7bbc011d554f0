//! An in-memory backend.
//!
//! Geometries are held as [geo::Geometry] values and intersection is
//! computed with [geo::Intersects]. The canonical GeoJSON text is kept next
//! to each geometry so reads return altitudes, which [geo] drops. Useful for
//! tests and small catalogs.

use crate::{
    plan::{Filter, QueryPlan, SortKey, SpatialOperand},
    projection::{ItemRecord, StoredItem},
    sort_by::{Column, Direction, SortField},
    Backend, Bbox, Error, Result,
};
use geo::{BoundingRect, Intersects};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};
use tracing::debug;

/// A backend that keeps everything in memory.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<String, Value>,
    items: BTreeMap<(String, String), MemoryItem>,
}

#[derive(Debug)]
struct MemoryItem {
    id: String,
    collection: String,
    data: Value,
    geometry: geo::Geometry<f64>,
    geojson: String,
}

enum Predicate<'a> {
    And(Vec<Predicate<'a>>),
    Or(Vec<Predicate<'a>>),
    Ids(&'a [String]),
    Collections(&'a [String]),
    Envelope(Bbox),
    Geometry(geo::Geometry<f64>),
}

impl MemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }
}

impl Backend for MemoryBackend {
    async fn collection_exists(&self, id: &str) -> Result<bool> {
        Ok(self.inner.read().collections.contains_key(id))
    }

    async fn insert_collection(&self, id: &str, data: Value) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.collections.contains_key(id) {
            Ok(false)
        } else {
            let _ = inner.collections.insert(id.to_string(), data);
            Ok(true)
        }
    }

    async fn fetch_collection(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().collections.get(id).cloned())
    }

    async fn remove_collection(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.collections.remove(id).is_some() {
            inner.items.retain(|(collection, _), _| collection != id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn insert_item(&self, record: &ItemRecord) -> Result<bool> {
        let geometry = construct(&record.geometry)?;
        let mut inner = self.inner.write();
        if !inner.collections.contains_key(&record.collection) {
            return Err(Error::NotFound(format!(
                "collection {} does not exist",
                record.collection
            )));
        }
        let key = (record.collection.clone(), record.id.clone());
        if inner.items.contains_key(&key) {
            return Ok(false);
        }
        let _ = inner.items.insert(key, MemoryItem::new(record, geometry));
        Ok(true)
    }

    async fn replace_item(&self, record: &ItemRecord) -> Result<bool> {
        let geometry = construct(&record.geometry)?;
        let mut inner = self.inner.write();
        match inner
            .items
            .get_mut(&(record.collection.clone(), record.id.clone()))
        {
            Some(item) => {
                *item = MemoryItem::new(record, geometry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_item(&self, id: &str, collection: &str) -> Result<bool> {
        Ok(self
            .inner
            .write()
            .items
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }

    async fn query(&self, plan: &QueryPlan) -> Result<Vec<StoredItem>> {
        let predicate = plan.filter.as_ref().map(Predicate::new).transpose()?;
        let limit = usize::try_from(plan.limit)
            .map_err(|_| Error::Programming(format!("negative limit: {}", plan.limit)))?;
        let inner = self.inner.read();
        let mut matches = inner
            .items
            .values()
            .filter(|item| {
                predicate
                    .as_ref()
                    .map(|predicate| predicate.matches(item))
                    .unwrap_or(true)
            })
            .collect::<Vec<_>>();
        debug!(matched = matches.len(), limit, "searched memory backend");
        if !plan.sort.is_empty() {
            matches.sort_by(|a, b| compare(a, b, &plan.sort));
        }
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|item| StoredItem {
                id: item.id.clone(),
                collection: item.collection.clone(),
                data: item.data.clone(),
                geometry: Some(item.geojson.clone()),
            })
            .collect())
    }
}

impl MemoryItem {
    fn new(record: &ItemRecord, geometry: geo::Geometry<f64>) -> MemoryItem {
        MemoryItem {
            id: record.id.clone(),
            collection: record.collection.clone(),
            data: record.data.clone(),
            geometry,
            geojson: record.geometry.clone(),
        }
    }
}

impl<'a> Predicate<'a> {
    fn new(filter: &'a Filter) -> Result<Predicate<'a>> {
        Ok(match filter {
            Filter::And(filters) => Predicate::And(
                filters
                    .iter()
                    .map(Predicate::new)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Filter::Or(filters) => Predicate::Or(
                filters
                    .iter()
                    .map(Predicate::new)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Filter::Ids(ids) => Predicate::Ids(ids),
            Filter::Collections(collections) => Predicate::Collections(collections),
            Filter::Intersects(SpatialOperand::Envelope(bbox)) => Predicate::Envelope(*bbox),
            Filter::Intersects(SpatialOperand::GeoJson(geojson)) => {
                Predicate::Geometry(construct(geojson)?)
            }
        })
    }

    fn matches(&self, item: &MemoryItem) -> bool {
        match self {
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(item)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(item)),
            Predicate::Ids(ids) => ids.iter().any(|id| *id == item.id),
            Predicate::Collections(collections) => collections
                .iter()
                .any(|collection| *collection == item.collection),
            Predicate::Envelope(bbox) => item
                .geometry
                .bounding_rect()
                .map(|rect| bbox.intersects_envelope(rect.min().x_y(), rect.max().x_y()))
                .unwrap_or(false),
            Predicate::Geometry(geometry) => item.geometry.intersects(geometry),
        }
    }
}

/// Constructs a native geometry from GeoJSON text.
///
/// The text was produced by this crate from an already validated geometry,
/// so failure is an internal error.
fn construct(geojson: &str) -> Result<geo::Geometry<f64>> {
    let geometry: geojson::Geometry = serde_json::from_str(geojson)
        .map_err(|err| Error::Programming(format!("invalid GeoJSON text: {}", err)))?;
    geo::Geometry::<f64>::try_from(geometry.value)
        .map_err(|err| Error::Programming(format!("could not construct geometry: {}", err)))
}

fn compare(a: &MemoryItem, b: &MemoryItem, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match &key.field {
            SortField::Column(Column::Id) => a.id.cmp(&b.id),
            SortField::Column(Column::Collection) => a.collection.cmp(&b.collection),
            SortField::Path(path) => compare_missing(lookup(&a.data, path), lookup(&b.data, path)),
        };
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn lookup<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(data, |value, key| match value {
        Value::Array(values) => key.parse::<usize>().ok().and_then(|i| values.get(i)),
        _ => value.get(key.as_str()),
    })
}

// Missing values sort after present ones, like SQL NULLs.
fn compare_missing(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_top_level(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// jsonb sorts an empty top-level array before everything else, null included.
fn compare_top_level(a: &Value, b: &Value) -> Ordering {
    match (is_empty_array(a), is_empty_array(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_json(a, b),
    }
}

fn is_empty_array(value: &Value) -> bool {
    matches!(value, Value::Array(values) if values.is_empty())
}

/// Orders JSON values the way PostgreSQL orders `jsonb`.
///
/// Strings compare bytewise, which matches the `C` collation.
fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
            a.iter()
                .zip(b)
                .map(|(a, b)| compare_json(a, b))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }),
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()).then_with(|| {
            let (a, b) = (storage_order(a), storage_order(b));
            a.iter()
                .zip(&b)
                .map(|((a_key, a_value), (b_key, b_value))| {
                    compare_keys(a_key, b_key).then_with(|| compare_json(a_value, b_value))
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn storage_order(object: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut pairs = object.iter().collect::<Vec<_>>();
    pairs.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    pairs
}

// jsonb stores object keys shortest first.
fn compare_keys(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
