//! Compiles a [Search] into a [QueryPlan].
//!
//! A plan is independent of any store's query language. [crate::Client]
//! renders it as SQL, and [crate::MemoryBackend] evaluates it directly.

use crate::{
    sort_by::{Direction, SortField},
    Bbox, Error, Geometry, Result, Search,
};
use tracing::debug;

/// A boolean filter over stored items.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// True if every filter is true. An empty `And` matches everything.
    And(Vec<Filter>),

    /// True if any filter is true. An empty `Or` matches nothing.
    Or(Vec<Filter>),

    /// The item's id is one of these (exact, case-sensitive).
    Ids(Vec<String>),

    /// The item's collection is one of these.
    Collections(Vec<String>),

    /// The item's geometry intersects this operand.
    Intersects(SpatialOperand),
}

/// The right-hand side of a spatial intersection test.
#[derive(Clone, Debug, PartialEq)]
pub enum SpatialOperand {
    /// The item's envelope intersects this box.
    Envelope(Bbox),

    /// The item's geometry intersects the geometry constructed from this
    /// GeoJSON text.
    GeoJson(String),
}

/// One key of a multi-key sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    /// What to sort on.
    pub field: SortField,

    /// Which way to sort.
    pub direction: Direction,
}

/// Everything a store needs to run a search.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    /// Items must match this filter, or every item matches if `None`.
    pub filter: Option<Filter>,

    /// Sort keys, primary first. Empty means store-default ordering.
    pub sort: Vec<SortKey>,

    /// The maximum number of items to return.
    pub limit: i64,
}

impl Filter {
    /// Compiles a spatial predicate from a bounding box.
    pub fn bbox(bbox: Bbox) -> Filter {
        Filter::Intersects(SpatialOperand::Envelope(bbox))
    }

    /// Compiles a spatial predicate from a geometry.
    ///
    /// A geometry collection becomes the `Or` of its members' predicates, so
    /// an empty collection matches nothing.
    pub fn geometry(geometry: &Geometry) -> Result<Filter> {
        match geometry {
            Geometry::GeometryCollection(geometries) => geometries
                .iter()
                .map(Filter::geometry)
                .collect::<Result<Vec<_>>>()
                .map(Filter::Or),
            _ => Ok(Filter::Intersects(SpatialOperand::GeoJson(
                geometry.to_geojson_string()?,
            ))),
        }
    }
}

impl Search {
    /// Compiles this search into a query plan.
    ///
    /// Nothing is executed; a plan that compiles is safe to hand to a store.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::{Filter, Search};
    ///
    /// let search = Search {
    ///     ids: vec!["an-id".to_string()],
    ///     ..Default::default()
    /// };
    /// let plan = search.compile().unwrap();
    /// assert_eq!(plan.filter, Some(Filter::Ids(vec!["an-id".to_string()])));
    /// assert_eq!(plan.limit, 100);
    /// ```
    pub fn compile(&self) -> Result<QueryPlan> {
        let limit = self.effective_limit()?;
        let mut filters = Vec::new();
        if !self.ids.is_empty() {
            filters.push(Filter::Ids(self.ids.clone()));
        }
        if !self.collections.is_empty() {
            filters.push(Filter::Collections(self.collections.clone()));
        }
        if let Some(filter) = self.spatial_filter()? {
            filters.push(filter);
        }
        let sort = self
            .sortby
            .iter()
            .map(|sort_by| {
                sort_by
                    .resolve()
                    .map(|(field, direction)| SortKey { field, direction })
            })
            .collect::<Result<Vec<_>>>()?;
        let filter = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        };
        let plan = QueryPlan {
            filter,
            sort,
            limit,
        };
        debug!(?plan, "compiled search");
        Ok(plan)
    }

    fn spatial_filter(&self) -> Result<Option<Filter>> {
        let supplied = [
            self.bbox.is_some(),
            self.geometry.is_some(),
            self.geometrycollection.is_some(),
        ];
        if supplied.iter().filter(|&&supplied| supplied).count() > 1 {
            return Err(Error::Validation(
                "only one of bbox, geometry, or geometrycollection may be supplied".to_string(),
            ));
        }
        if let Some(bbox) = &self.bbox {
            return Bbox::new(bbox).map(|bbox| Some(Filter::bbox(bbox)));
        }
        if let Some(raw) = &self.geometry {
            return Filter::geometry(&Geometry::from_raw(raw)?).map(Some);
        }
        if let Some(raw) = &self.geometrycollection {
            if raw.r#type != "GeometryCollection" {
                return Err(Error::Decode(format!(
                    "geometrycollection must have type GeometryCollection, got {}",
                    raw.r#type
                )));
            }
            return Filter::geometry(&Geometry::from_raw(raw)?).map(Some);
        }
        Ok(None)
    }
}
