use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sort by.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct SortBy {
    /// The field to sort by, e.g. `id` or `properties.datetime`.
    pub field: String,

    /// The direction to sort by, `asc` or `desc`.
    pub direction: String,
}

/// A sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    Ascending,

    /// Descending.
    Descending,
}

/// A column of the items table that can be sorted on directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    /// The item id.
    Id,

    /// The item's collection id.
    Collection,
}

/// What a sort directive refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortField {
    /// A column.
    Column(Column),

    /// A path into the item's JSON document, e.g. `["properties", "datetime"]`.
    Path(Vec<String>),
}

impl SortBy {
    /// Creates a new sort by.
    pub fn new(field: impl ToString, direction: impl ToString) -> SortBy {
        SortBy {
            field: field.to_string(),
            direction: direction.to_string(),
        }
    }

    /// Parses one entry of a `sortby` query parameter, e.g. `-id` or
    /// `+properties.datetime`.
    ///
    /// A bare field sorts ascending.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::SortBy;
    ///
    /// assert_eq!(SortBy::from_query("-id"), SortBy::new("id", "desc"));
    /// assert_eq!(SortBy::from_query("properties.datetime"), SortBy::new("properties.datetime", "asc"));
    /// ```
    pub fn from_query(s: &str) -> SortBy {
        let s = s.trim();
        if let Some(field) = s.strip_prefix('-') {
            SortBy::new(field, "desc")
        } else {
            SortBy::new(s.strip_prefix('+').unwrap_or(s), "asc")
        }
    }

    /// Resolves this sort by's field and direction.
    pub fn resolve(&self) -> Result<(SortField, Direction)> {
        Ok((self.field.parse()?, self.direction.parse()?))
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Direction> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Ascending)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Descending)
        } else {
            Err(Error::Validation(format!(
                "sort direction must be asc or desc, got {:?}",
                s
            )))
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<SortField> {
        match s {
            "id" => Ok(SortField::Column(Column::Id)),
            "collection" => Ok(SortField::Column(Column::Collection)),
            _ if s.contains('.') => {
                let path = s.split('.').map(String::from).collect::<Vec<_>>();
                if path.iter().any(|segment| segment.is_empty()) {
                    Err(Error::Validation(format!("invalid sort field: {:?}", s)))
                } else {
                    Ok(SortField::Path(path))
                }
            }
            _ => Err(Error::Validation(format!("unknown sort field: {:?}", s))),
        }
    }
}

impl Column {
    /// Returns this column's name.
    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Collection => "collection",
        }
    }
}
