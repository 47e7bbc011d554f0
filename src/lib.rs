//! Spatial item search for STAC catalogs stored in PostGIS.
//!
//! A [Search] names ids, collections, a bounding box or a GeoJSON geometry,
//! sort directives, and a limit. [Search::compile] turns it into a
//! [QueryPlan] without touching a store; a [Backend] runs the plan and
//! assembles a [Page] of matching items.
//!
//! ```
//! use stac_postgis::{Backend, MemoryBackend, Search};
//! use stac::{Collection, Geometry, Item};
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! backend
//!     .add_collection(Collection::new("collection-id", "a description"))
//!     .await
//!     .unwrap();
//! let mut item = Item::new("an-id");
//! item.collection = Some("collection-id".to_string());
//! item.geometry = Some(Geometry::point(-105.1, 40.2));
//! backend.add_item(item).await.unwrap();
//!
//! let search = Search {
//!     bbox: Some(vec![-106., 40., -105., 41.]),
//!     ..Default::default()
//! };
//! let page = backend.search(search).await.unwrap();
//! assert_eq!(page.context.returned, 1);
//! # })
//! ```

#![warn(missing_docs)]

mod backend;
mod bbox;
mod client;
mod error;
mod geometry;
mod memory;
mod page;
mod plan;
mod projection;
mod search;
mod sort_by;
mod sql;

pub use crate::{
    backend::Backend,
    bbox::Bbox,
    client::Client,
    error::{Error, Result},
    geometry::{Geometry, Position, RawGeometry},
    memory::MemoryBackend,
    page::{Context, Page},
    plan::{Filter, QueryPlan, SortKey, SpatialOperand},
    projection::{ItemRecord, StoredItem},
    search::{GetSearch, Search, DEFAULT_LIMIT},
    sort_by::{Column, Direction, SortBy, SortField},
    sql::{Param, GEOJSON_MAX_DECIMAL_DIGITS, SRID},
};
