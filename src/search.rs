use crate::{geometry::RawGeometry, Error, Result, SortBy};
use serde::{Deserialize, Serialize};

/// The number of items returned when a search doesn't specify a limit.
pub const DEFAULT_LIMIT: i64 = 100;

/// Search.
///
/// This is the body of a `POST /search`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Search {
    /// Array of Item ids to return.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,

    /// Array of Collection ids to include in the search for items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,

    /// The maximum number of results to return (page size).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    /// Requested bounding box, four or six elements.
    ///
    /// An empty array is invalid, not the same as no bbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    /// Searches items by performing intersection between their geometry and
    /// this geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<RawGeometry>,

    /// Searches items that intersect any member of this geometry collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometrycollection: Option<RawGeometry>,

    /// Sort directives, primary key first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<SortBy>,
}

/// A search expressed as query string parameters, i.e. `GET /search`.
///
/// Every field is the raw (already percent-decoded) parameter value.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct GetSearch {
    /// Comma-separated item ids.
    pub ids: Option<String>,

    /// Comma-separated collection ids.
    pub collections: Option<String>,

    /// The page size.
    pub limit: Option<String>,

    /// Comma-separated bounding box.
    pub bbox: Option<String>,

    /// A GeoJSON geometry.
    pub geometry: Option<String>,

    /// Comma-separated sort fields, each optionally prefixed by `+` or `-`.
    pub sortby: Option<String>,
}

impl Search {
    /// Returns the limit this search will use.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::Search;
    ///
    /// assert_eq!(Search::default().effective_limit().unwrap(), 100);
    /// let search = Search { limit: Some(0), ..Default::default() };
    /// assert!(search.effective_limit().is_err());
    /// ```
    pub fn effective_limit(&self) -> Result<i64> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(limit) if limit > 0 => Ok(limit),
            Some(limit) => Err(Error::Validation(format!(
                "limit must be greater than zero, got {}",
                limit
            ))),
        }
    }

    /// Returns true if this search has any spatial constraint.
    pub fn has_spatial_filter(&self) -> bool {
        self.bbox.is_some() || self.geometry.is_some() || self.geometrycollection.is_some()
    }
}

impl TryFrom<GetSearch> for Search {
    type Error = Error;

    fn try_from(get_search: GetSearch) -> Result<Search> {
        let limit = get_search
            .limit
            .map(|limit| {
                limit.trim().parse::<i64>().map_err(|_| {
                    Error::Validation(format!("limit must be an integer, got {:?}", limit))
                })
            })
            .transpose()?;
        let bbox = get_search
            .bbox
            .map(|bbox| {
                split(&bbox)
                    .map(|value| {
                        value.parse::<f64>().map_err(|_| {
                            Error::Validation(format!("bbox value is not a number: {:?}", value))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        let geometry = get_search
            .geometry
            .map(|geometry| {
                serde_json::from_str::<RawGeometry>(&geometry)
                    .map_err(|err| Error::Decode(format!("geometry is not GeoJSON: {}", err)))
            })
            .transpose()?;
        Ok(Search {
            ids: get_search.ids.as_deref().map(strings).unwrap_or_default(),
            collections: get_search
                .collections
                .as_deref()
                .map(strings)
                .unwrap_or_default(),
            limit,
            bbox,
            geometry,
            geometrycollection: None,
            sortby: get_search
                .sortby
                .as_deref()
                .map(|sortby| split(sortby).map(SortBy::from_query).collect())
                .unwrap_or_default(),
        })
    }
}

fn split(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn strings(s: &str) -> Vec<String> {
    split(s).map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::{GetSearch, Search, DEFAULT_LIMIT};
    use crate::{Error, SortBy};
    use serde_json::json;

    #[test]
    fn deserialize_post_body() {
        let search: Search = serde_json::from_value(json!({
            "collections": ["sentinel-s2-l2a-cogs-test"],
            "bbox": [97.504892, -75.254738, 179.321298, -65.431580],
            "sortby": [{"field": "id", "direction": "DESC"}]
        }))
        .unwrap();
        assert_eq!(search.collections, vec!["sentinel-s2-l2a-cogs-test"]);
        assert_eq!(search.bbox.as_ref().map(Vec::len), Some(4));
        assert_eq!(search.sortby, vec![SortBy::new("id", "DESC")]);
        assert!(search.ids.is_empty());
        assert!(search.limit.is_none());
        assert!(search.has_spatial_filter());
    }

    #[test]
    fn effective_limit() {
        assert_eq!(Search::default().effective_limit().unwrap(), DEFAULT_LIMIT);
        let search = Search {
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(search.effective_limit().unwrap(), 10);
        let search = Search {
            limit: Some(-1),
            ..Default::default()
        };
        assert!(matches!(search.effective_limit(), Err(Error::Validation(_))));
    }

    #[test]
    fn get_search_bbox_and_limit() {
        let get_search = GetSearch {
            bbox: Some("97.504892,-75.254738,179.321298,-65.431580".to_string()),
            limit: Some("10".to_string()),
            ..Default::default()
        };
        let search = Search::try_from(get_search).unwrap();
        assert_eq!(
            search.bbox,
            Some(vec![97.504892, -75.254738, 179.321298, -65.431580])
        );
        assert_eq!(search.limit, Some(10));
    }

    #[test]
    fn get_search_geometry() {
        let get_search = GetSearch {
            geometry: Some(
                r#"{"type": "LineString","coordinates": [[179.85156249999997,-70.554563528593656],[171.101642,-75.690647]]}"#
                    .to_string(),
            ),
            ..Default::default()
        };
        let search = Search::try_from(get_search).unwrap();
        assert_eq!(search.geometry.unwrap().r#type, "LineString");
    }

    #[test]
    fn get_search_lists() {
        let get_search = GetSearch {
            ids: Some("a, b,,c".to_string()),
            collections: Some("collection-id".to_string()),
            sortby: Some(" id,-properties.datetime".to_string()),
            ..Default::default()
        };
        let search = Search::try_from(get_search).unwrap();
        assert_eq!(search.ids, vec!["a", "b", "c"]);
        assert_eq!(search.collections, vec!["collection-id"]);
        assert_eq!(
            search.sortby,
            vec![
                SortBy::new("id", "asc"),
                SortBy::new("properties.datetime", "desc")
            ]
        );
    }

    #[test]
    fn get_search_empty_bbox() {
        let get_search = GetSearch {
            bbox: Some(" , ".to_string()),
            ..Default::default()
        };
        let search = Search::try_from(get_search).unwrap();
        assert_eq!(search.bbox, Some(Vec::new()));
        assert!(search.has_spatial_filter());
        assert!(matches!(search.compile(), Err(Error::Validation(_))));
    }

    #[test]
    fn get_search_errors() {
        let get_search = GetSearch {
            bbox: Some("1,2,three,4".to_string()),
            ..Default::default()
        };
        assert!(matches!(Search::try_from(get_search), Err(Error::Validation(_))));
        let get_search = GetSearch {
            limit: Some("ten".to_string()),
            ..Default::default()
        };
        assert!(matches!(Search::try_from(get_search), Err(Error::Validation(_))));
        let get_search = GetSearch {
            geometry: Some("{not json".to_string()),
            ..Default::default()
        };
        assert!(matches!(Search::try_from(get_search), Err(Error::Decode(_))));
    }
}
