//! Renders a [QueryPlan] as a parameterized PostGIS query.
//!
//! User input never appears in the statement text; every id, collection,
//! coordinate, path, and geometry is bound as a parameter.

use crate::{
    plan::{Filter, QueryPlan, SortKey, SpatialOperand},
    sort_by::{Direction, SortField},
};
use bytes::BytesMut;
use std::error::Error as StdError;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

/// The spatial reference id of stored geometries.
pub const SRID: i32 = 4326;

/// The number of decimal digits used when rendering stored geometries as
/// GeoJSON.
pub const GEOJSON_MAX_DECIMAL_DIGITS: i32 = 15;

/// A bound query parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// `text`
    Text(String),

    /// `text[]`
    TextArray(Vec<String>),

    /// `double precision`
    Float(f64),

    /// `bigint`
    BigInt(i64),
}

impl QueryPlan {
    /// Renders this plan as a SQL statement and its parameters.
    ///
    /// The statement selects `id`, `collection`, `data`, and `geometry` (as
    /// GeoJSON text) from the `items` table.
    pub fn to_sql(&self) -> (String, Vec<Param>) {
        let mut builder = Builder::default();
        let mut sql = format!(
            "SELECT id, collection, data, ST_AsGeoJSON(geometry, {}) AS geometry FROM items",
            GEOJSON_MAX_DECIMAL_DIGITS
        );
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&builder.filter(filter));
        }
        if !self.sort.is_empty() {
            let keys = self
                .sort
                .iter()
                .map(|key| builder.sort_key(key))
                .collect::<Vec<_>>();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }
        let limit = builder.bind(Param::BigInt(self.limit));
        sql.push_str(" LIMIT ");
        sql.push_str(&limit);
        (sql, builder.params)
    }
}

#[derive(Debug, Default)]
struct Builder {
    params: Vec<Param>,
}

impl Builder {
    fn bind(&mut self, param: Param) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn filter(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::And(filters) => self.join(filters, " AND ", "TRUE"),
            Filter::Or(filters) => self.join(filters, " OR ", "FALSE"),
            Filter::Ids(ids) => format!("id = ANY({})", self.bind(Param::TextArray(ids.clone()))),
            Filter::Collections(collections) => format!(
                "collection = ANY({})",
                self.bind(Param::TextArray(collections.clone()))
            ),
            Filter::Intersects(SpatialOperand::Envelope(bbox)) => {
                let min_x = self.bind(Param::Float(bbox.min_x));
                let min_y = self.bind(Param::Float(bbox.min_y));
                let max_x = self.bind(Param::Float(bbox.max_x));
                let max_y = self.bind(Param::Float(bbox.max_y));
                format!(
                    "(ST_XMin(geometry) <= {max_x} AND ST_XMax(geometry) >= {min_x} AND ST_YMin(geometry) <= {max_y} AND ST_YMax(geometry) >= {min_y})",
                )
            }
            Filter::Intersects(SpatialOperand::GeoJson(geojson)) => format!(
                "ST_Intersects(geometry, ST_SetSRID(ST_GeomFromGeoJSON({}::text), {}))",
                self.bind(Param::Text(geojson.clone())),
                SRID
            ),
        }
    }

    fn join(&mut self, filters: &[Filter], separator: &str, empty: &str) -> String {
        if filters.is_empty() {
            return empty.to_string();
        }
        let parts = filters
            .iter()
            .map(|filter| self.filter(filter))
            .collect::<Vec<_>>();
        format!("({})", parts.join(separator))
    }

    fn sort_key(&mut self, key: &SortKey) -> String {
        let expression = match &key.field {
            SortField::Column(column) => column.name().to_string(),
            SortField::Path(path) => format!(
                "data #> {}::text[]",
                self.bind(Param::TextArray(path.clone()))
            ),
        };
        match key.direction {
            Direction::Ascending => format!("{} ASC", expression),
            Direction::Descending => format!("{} DESC", expression),
        }
    }
}

impl ToSql for Param {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            Param::Text(s) => s.to_sql(ty, out),
            Param::TextArray(v) => v.to_sql(ty, out),
            Param::Float(f) => f.to_sql(ty, out),
            Param::BigInt(i) => i.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <String as ToSql>::accepts(ty)
            || <Vec<String> as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

/// Borrows parameters in the form [tokio_postgres] expects.
pub(crate) fn as_params(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| param as &(dyn ToSql + Sync))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::Param;
    use crate::Search;
    use serde_json::json;

    fn render(value: serde_json::Value) -> (String, Vec<Param>) {
        serde_json::from_value::<Search>(value)
            .unwrap()
            .compile()
            .unwrap()
            .to_sql()
    }

    #[test]
    fn everything() {
        let (sql, params) = render(json!({}));
        assert_eq!(
            sql,
            "SELECT id, collection, data, ST_AsGeoJSON(geometry, 15) AS geometry FROM items LIMIT $1"
        );
        assert_eq!(params, vec![Param::BigInt(100)]);
    }

    #[test]
    fn ids_and_collections() {
        let (sql, params) = render(json!({"ids": ["X"], "collections": ["C"], "limit": 3}));
        assert!(sql.ends_with(" WHERE (id = ANY($1) AND collection = ANY($2)) LIMIT $3"));
        assert_eq!(
            params,
            vec![
                Param::TextArray(vec!["X".to_string()]),
                Param::TextArray(vec!["C".to_string()]),
                Param::BigInt(3),
            ]
        );
    }

    #[test]
    fn bbox() {
        let (sql, params) = render(json!({"bbox": [170, -74, 178, -70]}));
        assert!(sql.contains(
            "WHERE (ST_XMin(geometry) <= $3 AND ST_XMax(geometry) >= $1 AND ST_YMin(geometry) <= $4 AND ST_YMax(geometry) >= $2)"
        ));
        assert_eq!(
            params[..4],
            [
                Param::Float(170.),
                Param::Float(-74.),
                Param::Float(178.),
                Param::Float(-70.)
            ]
        );
    }

    #[test]
    fn geometry_is_bound_not_inlined() {
        let (sql, params) = render(json!({
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        }));
        assert!(sql.contains("ST_Intersects(geometry, ST_SetSRID(ST_GeomFromGeoJSON($1::text), 4326))"));
        assert!(!sql.contains("Point"));
        assert!(matches!(&params[0], Param::Text(text) if text.contains("Point")));
    }

    #[test]
    fn geometry_collection() {
        let (sql, _) = render(json!({
            "geometrycollection": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Point", "coordinates": [1.0, 2.0]},
                    {"type": "Point", "coordinates": [3.0, 4.0]}
                ]
            }
        }));
        assert!(sql.contains(
            "WHERE (ST_Intersects(geometry, ST_SetSRID(ST_GeomFromGeoJSON($1::text), 4326)) OR ST_Intersects(geometry, ST_SetSRID(ST_GeomFromGeoJSON($2::text), 4326)))"
        ));
    }

    #[test]
    fn empty_geometry_collection() {
        let (sql, _) = render(json!({
            "geometrycollection": {"type": "GeometryCollection", "geometries": []}
        }));
        assert!(sql.contains(" WHERE FALSE LIMIT $1"));
    }

    #[test]
    fn sortby() {
        let (sql, params) = render(json!({
            "sortby": [
                {"field": "properties.datetime", "direction": "desc"},
                {"field": "id", "direction": "asc"}
            ]
        }));
        assert!(sql.ends_with(" ORDER BY data #> $1::text[] DESC, id ASC LIMIT $2"));
        assert_eq!(
            params[0],
            Param::TextArray(vec!["properties".to_string(), "datetime".to_string()])
        );
    }

    #[test]
    fn malicious_ids_are_parameters() {
        let (sql, params) = render(json!({"ids": ["'; DROP TABLE items; --"]}));
        assert!(!sql.contains("DROP"));
        assert_eq!(
            params[0],
            Param::TextArray(vec!["'; DROP TABLE items; --".to_string()])
        );
    }
}
