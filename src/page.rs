use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A page of search results, as a GeoJSON `FeatureCollection`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Page {
    /// This should always be "FeatureCollection".
    pub r#type: String,

    /// The matched items, render-ready.
    pub features: Vec<Map<String, Value>>,

    /// The search context.
    pub context: Context,

    /// The collection id, only set when listing a single collection's items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// How many items were returned, and the limit that capped them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct Context {
    /// The number of features in this page.
    pub returned: usize,

    /// The limit used for this page.
    pub limit: i64,
}

impl Page {
    /// Creates a new page.
    pub fn new(features: Vec<Map<String, Value>>, limit: i64) -> Page {
        Page {
            r#type: "FeatureCollection".to_string(),
            context: Context {
                returned: features.len(),
                limit,
            },
            features,
            collection: None,
        }
    }
}
