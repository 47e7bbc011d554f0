//! GeoJSON geometries.
//!
//! Geometries arrive as a [RawGeometry]: the `type` tag plus undecoded
//! `coordinates` (or `geometries`, for collections). The depth of
//! `coordinates` depends on the type, so [Geometry::from_raw] reads the tag
//! first and only then decodes the coordinates into the matching shape.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

const MIN_RING_LENGTH: usize = 4;

/// A position with an optional altitude.
///
/// Validation only looks at `x` and `y`. The altitude is carried through to
/// the stored geometry; any coordinates after it are discarded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Longitude, or easting.
    pub x: f64,

    /// Latitude, or northing.
    pub y: f64,

    /// Altitude, if present.
    pub z: Option<f64>,
}

/// A geometry whose coordinates have been decoded and validated.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    /// A single position.
    Point(Position),

    /// One or more positions.
    MultiPoint(Vec<Position>),

    /// Two or more positions.
    LineString(Vec<Position>),

    /// An exterior ring followed by zero or more holes.
    Polygon(Vec<Vec<Position>>),

    /// Zero or more line strings.
    MultiLineString(Vec<Vec<Position>>),

    /// Zero or more polygons.
    MultiPolygon(Vec<Vec<Vec<Position>>>),

    /// Zero or more geometries, each independently tagged.
    GeometryCollection(Vec<Geometry>),
}

/// A geometry envelope with its coordinates left undecoded.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct RawGeometry {
    /// The geometry type, e.g. `Polygon`.
    pub r#type: String,

    /// The coordinates, required by every type except `GeometryCollection`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Value>,

    /// The member geometries of a `GeometryCollection`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometries: Option<Vec<RawGeometry>>,
}

impl Position {
    /// Creates a new position.
    pub fn new(x: f64, y: f64) -> Position {
        Position { x, y, z: None }
    }

    /// Returns this position with an altitude.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::Position;
    /// let position = Position::new(-105.1019, 40.1672).with_z(1600.);
    /// assert_eq!(position.z, Some(1600.));
    /// ```
    pub fn with_z(self, z: f64) -> Position {
        Position { z: Some(z), ..self }
    }

    fn same_xy(&self, other: &Position) -> bool {
        self.x == other.x && self.y == other.y
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }

    fn to_vec(self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.x, self.y, z],
            None => vec![self.x, self.y],
        }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Position, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        if values.len() < 2 {
            return Err(serde::de::Error::invalid_length(
                values.len(),
                &"a position with at least two coordinates",
            ));
        }
        let position = Position::new(values[0], values[1]);
        Ok(match values.get(2) {
            Some(&z) => position.with_z(z),
            None => position,
        })
    }
}

impl From<[f64; 2]> for Position {
    fn from(value: [f64; 2]) -> Position {
        Position::new(value[0], value[1])
    }
}

impl Geometry {
    /// Decodes a geometry from a raw envelope, dispatching on its type.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::{Geometry, RawGeometry};
    ///
    /// let raw: RawGeometry =
    ///     serde_json::from_str(r#"{"type": "Point", "coordinates": [-105.1, 40.2]}"#).unwrap();
    /// let geometry = Geometry::from_raw(&raw).unwrap();
    /// assert_eq!(geometry.type_name(), "Point");
    /// ```
    pub fn from_raw(raw: &RawGeometry) -> Result<Geometry> {
        match raw.r#type.as_str() {
            "Point" => Ok(Geometry::Point(coordinates(raw)?)),
            "MultiPoint" => {
                let points: Vec<Position> = coordinates(raw)?;
                if points.is_empty() {
                    Err(Error::Decode(
                        "MultiPoint must have at least one position".to_string(),
                    ))
                } else {
                    Ok(Geometry::MultiPoint(points))
                }
            }
            "LineString" => Ok(Geometry::LineString(line(coordinates(raw)?)?)),
            "Polygon" => Ok(Geometry::Polygon(polygon(coordinates(raw)?)?)),
            "MultiLineString" => {
                let lines: Vec<Vec<Position>> = coordinates(raw)?;
                lines
                    .into_iter()
                    .map(line)
                    .collect::<Result<Vec<_>>>()
                    .map(Geometry::MultiLineString)
            }
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<Position>>> = coordinates(raw)?;
                polygons
                    .into_iter()
                    .map(polygon)
                    .collect::<Result<Vec<_>>>()
                    .map(Geometry::MultiPolygon)
            }
            "GeometryCollection" => {
                let geometries = raw.geometries.as_ref().ok_or_else(|| {
                    Error::Decode("GeometryCollection is missing geometries".to_string())
                })?;
                geometries
                    .iter()
                    .map(Geometry::from_raw)
                    .collect::<Result<Vec<_>>>()
                    .map(Geometry::GeometryCollection)
            }
            other => Err(Error::Decode(format!("unknown geometry type: {}", other))),
        }
    }

    /// Decodes a geometry from a JSON value, e.g. the `geometry` field of an
    /// item.
    pub fn from_json_value(value: &Value) -> Result<Geometry> {
        let raw = RawGeometry::deserialize(value)
            .map_err(|err| Error::Decode(format!("not a geometry object: {}", err)))?;
        Geometry::from_raw(&raw)
    }

    /// Returns this geometry's GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    fn is_finite(&self) -> bool {
        fn all(positions: &[Position]) -> bool {
            positions.iter().all(Position::is_finite)
        }
        match self {
            Geometry::Point(position) => position.is_finite(),
            Geometry::MultiPoint(positions) | Geometry::LineString(positions) => all(positions),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().all(|ring| all(ring))
            }
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .all(|rings| rings.iter().all(|ring| all(ring))),
            Geometry::GeometryCollection(geometries) => {
                geometries.iter().all(Geometry::is_finite)
            }
        }
    }

    /// Converts this geometry to a [geojson::Geometry].
    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(self.into())
    }

    /// Serializes this geometry as canonical GeoJSON text.
    ///
    /// Decoded geometries are always serializable, so a failure here is a
    /// [Error::Programming]. That includes non-finite coordinates, which
    /// JSON can't represent.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::{Geometry, Position};
    /// let geometry = Geometry::Point(Position::new(f64::NAN, 0.));
    /// assert!(geometry.to_geojson_string().is_err());
    /// ```
    pub fn to_geojson_string(&self) -> Result<String> {
        if !self.is_finite() {
            return Err(Error::Programming(format!(
                "{} has a non-finite coordinate",
                self.type_name()
            )));
        }
        serde_json::to_string(&self.to_geojson()).map_err(|err| {
            Error::Programming(format!(
                "could not serialize a decoded {}: {}",
                self.type_name(),
                err
            ))
        })
    }
}

impl FromStr for Geometry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Geometry> {
        let raw: RawGeometry = serde_json::from_str(s)
            .map_err(|err| Error::Decode(format!("not a geometry object: {}", err)))?;
        Geometry::from_raw(&raw)
    }
}

impl From<&Geometry> for geojson::Value {
    fn from(geometry: &Geometry) -> geojson::Value {
        match geometry {
            Geometry::Point(position) => geojson::Value::Point(position.to_vec()),
            Geometry::MultiPoint(positions) => geojson::Value::MultiPoint(to_vecs(positions)),
            Geometry::LineString(positions) => geojson::Value::LineString(to_vecs(positions)),
            Geometry::Polygon(rings) => {
                geojson::Value::Polygon(rings.iter().map(|ring| to_vecs(ring)).collect())
            }
            Geometry::MultiLineString(lines) => {
                geojson::Value::MultiLineString(lines.iter().map(|line| to_vecs(line)).collect())
            }
            Geometry::MultiPolygon(polygons) => geojson::Value::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| rings.iter().map(|ring| to_vecs(ring)).collect())
                    .collect(),
            ),
            Geometry::GeometryCollection(geometries) => geojson::Value::GeometryCollection(
                geometries.iter().map(Geometry::to_geojson).collect(),
            ),
        }
    }
}

fn coordinates<T>(raw: &RawGeometry) -> Result<T>
where
    T: DeserializeOwned,
{
    let coordinates = raw
        .coordinates
        .as_ref()
        .ok_or_else(|| Error::Decode(format!("{} is missing coordinates", raw.r#type)))?;
    T::deserialize(coordinates)
        .map_err(|err| Error::Decode(format!("invalid {} coordinates: {}", raw.r#type, err)))
}

fn line(positions: Vec<Position>) -> Result<Vec<Position>> {
    if positions.len() < 2 {
        Err(Error::Decode(format!(
            "a line string needs at least two positions, found {}",
            positions.len()
        )))
    } else {
        Ok(positions)
    }
}

fn polygon(rings: Vec<Vec<Position>>) -> Result<Vec<Vec<Position>>> {
    if rings.is_empty() {
        return Err(Error::Decode(
            "a polygon needs an exterior ring".to_string(),
        ));
    }
    for ring in &rings {
        if ring.len() < MIN_RING_LENGTH {
            return Err(Error::Decode(format!(
                "a polygon ring needs at least {} positions, found {}",
                MIN_RING_LENGTH,
                ring.len()
            )));
        }
        let closed = match (ring.first(), ring.last()) {
            (Some(first), Some(last)) => first.same_xy(last),
            _ => false,
        };
        if !closed {
            return Err(Error::Decode("polygon ring is not closed".to_string()));
        }
    }
    Ok(rings)
}

fn to_vecs(positions: &[Position]) -> Vec<Vec<f64>> {
    positions.iter().map(|position| position.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::{Geometry, Position, RawGeometry};
    use crate::Error;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> crate::Result<Geometry> {
        Geometry::from_json_value(&value)
    }

    fn square() -> Vec<Position> {
        vec![
            [0., 0.].into(),
            [1., 0.].into(),
            [1., 1.].into(),
            [0., 1.].into(),
            [0., 0.].into(),
        ]
    }

    #[test]
    fn point() {
        let geometry = decode(json!({"type": "Point", "coordinates": [-105.1019, 40.1672]})).unwrap();
        assert_eq!(geometry, Geometry::Point(Position::new(-105.1019, 40.1672)));
    }

    #[test]
    fn point_with_altitude() {
        let geometry = decode(json!({"type": "Point", "coordinates": [1., 2., 3., 4.]})).unwrap();
        assert_eq!(geometry, Geometry::Point(Position::new(1., 2.).with_z(3.)));
        let value: serde_json::Value =
            serde_json::from_str(&geometry.to_geojson_string().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "Point", "coordinates": [1.0, 2.0, 3.0]}));
    }

    #[test]
    fn ring_closure_ignores_altitude() {
        let geometry = decode(json!({
            "type": "Polygon",
            "coordinates": [[[0., 0., 1.], [1., 0., 1.], [1., 1., 1.], [0., 0., 2.]]]
        }));
        assert!(geometry.is_ok());
    }

    #[test]
    fn point_with_one_coordinate() {
        assert!(matches!(
            decode(json!({"type": "Point", "coordinates": [1.]})),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn unknown_type() {
        let err = decode(json!({"type": "Circle", "coordinates": [1., 2.]})).unwrap_err();
        match err {
            Error::Decode(message) => assert!(message.contains("Circle")),
            _ => panic!("unexpected error: {:?}", err),
        }
    }

    #[test]
    fn type_and_depth_disagree() {
        assert!(matches!(
            decode(json!({"type": "Point", "coordinates": [[1., 2.]]})),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            decode(json!({"type": "Polygon", "coordinates": [[1., 2.], [3., 4.]]})),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn line_string_too_short() {
        assert!(decode(json!({"type": "LineString", "coordinates": [[1., 2.]]})).is_err());
        assert!(decode(json!({"type": "LineString", "coordinates": [[1., 2.], [3., 4.]]})).is_ok());
    }

    #[test]
    fn multi_point() {
        assert!(decode(json!({"type": "MultiPoint", "coordinates": []})).is_err());
        assert_eq!(
            decode(json!({"type": "MultiPoint", "coordinates": [[1., 2.]]})).unwrap(),
            Geometry::MultiPoint(vec![Position::new(1., 2.)])
        );
    }

    #[test]
    fn polygon_ring_too_short() {
        let err = decode(json!({
            "type": "Polygon",
            "coordinates": [[[0., 0.], [1., 0.], [0., 0.]]]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn polygon_ring_not_closed() {
        let err = decode(json!({
            "type": "Polygon",
            "coordinates": [[[0., 0.], [1., 0.], [1., 1.], [0., 1.]]]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn polygon_without_rings() {
        assert!(decode(json!({"type": "Polygon", "coordinates": []})).is_err());
    }

    #[test]
    fn multi_polygon_validates_every_ring() {
        let err = decode(json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0., 0.], [1., 0.], [1., 1.], [0., 1.], [0., 0.]]],
                [[[0., 0.], [1., 0.], [1., 1.], [0., 1.]]]
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn geometry_collection() {
        let geometry = decode(json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1., 2.]},
                {"type": "GeometryCollection", "geometries": []}
            ]
        }))
        .unwrap();
        assert_eq!(
            geometry,
            Geometry::GeometryCollection(vec![
                Geometry::Point(Position::new(1., 2.)),
                Geometry::GeometryCollection(Vec::new()),
            ])
        );
    }

    #[test]
    fn geometry_collection_member_error() {
        assert!(matches!(
            decode(json!({
                "type": "GeometryCollection",
                "geometries": [{"type": "Triangle", "coordinates": []}]
            })),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn type_decides_between_coordinates_and_geometries() {
        let point = decode(json!({
            "type": "Point",
            "coordinates": [1., 2.],
            "geometries": []
        }))
        .unwrap();
        assert_eq!(point, Geometry::Point(Position::new(1., 2.)));

        let err = decode(json!({
            "type": "GeometryCollection",
            "coordinates": [1., 2.]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let err = decode(json!({"type": "Point", "geometries": []})).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn encode_then_decode() {
        let geometry = Geometry::GeometryCollection(vec![
            Geometry::Point(Position::new(178.35937499999999, -74.14512718337613)),
            Geometry::LineString(vec![
                Position::new(179.85156249999997, -70.554563528593656),
                Position::new(171.101642, -75.690647),
            ]),
            Geometry::Polygon(vec![square()]),
            Geometry::MultiPolygon(vec![vec![square()], vec![square(), square()]]),
        ]);
        let text = geometry.to_geojson_string().unwrap();
        assert_eq!(text.parse::<Geometry>().unwrap(), geometry);
    }

    #[test]
    fn canonical_text() {
        let geometry = Geometry::Point(Position::new(1.5, -2.));
        let text = geometry.to_geojson_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "Point", "coordinates": [1.5, -2.0]}));
    }

    #[test]
    fn non_finite_coordinates() {
        let geometry = Geometry::Point(Position::new(f64::NAN, 0.));
        assert!(matches!(
            geometry.to_geojson_string(),
            Err(Error::Programming(_))
        ));
        let geometry = Geometry::GeometryCollection(vec![
            Geometry::Point(Position::new(1., 2.)),
            Geometry::LineString(vec![
                Position::new(0., 0.),
                Position::new(1., 1.).with_z(f64::INFINITY),
            ]),
        ]);
        assert!(matches!(
            geometry.to_geojson_string(),
            Err(Error::Programming(_))
        ));
    }

    #[test]
    fn raw_keeps_coordinates_undecoded() {
        let raw: RawGeometry =
            serde_json::from_value(json!({"type": "Polygon", "coordinates": [[[0, 0]]]})).unwrap();
        assert_eq!(raw.r#type, "Polygon");
        assert!(Geometry::from_raw(&raw).is_err());
    }
}
