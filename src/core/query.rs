//! List-endpoint query features: filter, search, geo radius, sort, field selection, paging
//!
//! Query strings are parsed against a per-entity [`EntitySchema`] that whitelists
//! the fields a client may filter or sort on. The SQL rendering lives in
//! `storage::sql`; this module only validates and structures the request.

use crate::core::geo::{parse_latlng, GeoPoint, EARTH_RADIUS_KM};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// Parameters that never act as filters
pub const RESERVED_PARAMS: &[&str] = &[
    "page", "sort", "limit", "fields", "search", "latlng", "distance",
];

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 100;

static FILTER_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[(gte|gt|lte|lt)\])?$").expect("Invalid filter key regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Cannot filter on field '{0}'.")]
    UnknownFilter(String),

    #[error("Operator '{op}' is not supported on field '{field}'.")]
    UnsupportedOperator { field: String, op: String },

    #[error("Invalid value '{value}' for field '{field}'.")]
    InvalidValue { field: String, value: String },

    #[error("Cannot sort on field '{0}'.")]
    UnknownSort(String),

    #[error("Cannot mix included and excluded fields in 'fields'.")]
    MixedFieldSelection,
}

/// How a column is compared and bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Timestamp,
    Id,
    /// JSON array column; equality means membership
    TagList,
}

impl FieldKind {
    fn supports_ranges(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Timestamp)
    }
}

#[derive(Debug)]
pub struct FieldSpec {
    /// Name used in query strings and JSON output
    pub name: &'static str,
    /// Qualified SQL column
    pub column: &'static str,
    pub kind: FieldKind,
    pub sortable: bool,
}

/// Query surface of one entity
#[derive(Debug)]
pub struct EntitySchema {
    pub fields: &'static [FieldSpec],
    /// Columns matched by `search`; empty disables search
    pub search_columns: &'static [&'static str],
    /// (longitude, latitude) columns; `None` disables the geo filter
    pub geo_columns: Option<(&'static str, &'static str)>,
    /// Insertion-order column used to break sort ties
    pub tiebreak_column: &'static str,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub const fn new(
        fields: &'static [FieldSpec],
        search_columns: &'static [&'static str],
        geo_columns: Option<(&'static str, &'static str)>,
        tiebreak_column: &'static str,
    ) -> Self {
        Self {
            fields,
            search_columns,
            geo_columns,
            tiebreak_column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: &'static FieldSpec,
    pub op: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: &'static FieldSpec,
    pub descending: bool,
}

/// Spherical cap around `center`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoWithin {
    pub center: GeoPoint,
    pub radius_radians: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldSelection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl FieldSelection {
    /// Apply the selection to a serialised entity's top-level keys
    pub fn project(&self, value: &mut Value) {
        let Value::Object(map) = value else {
            return;
        };
        match self {
            FieldSelection::All => {}
            FieldSelection::Include(keep) => {
                map.retain(|key, _| key == "_id" || keep.iter().any(|k| k == key));
            }
            FieldSelection::Exclude(drop) => {
                map.retain(|key, _| !drop.iter().any(|k| k == key));
            }
        }
    }

    /// Serialise each item and apply the selection
    pub fn project_all<T: serde::Serialize>(&self, items: &[T]) -> Vec<Value> {
        items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .map(|mut value| {
                self.project(&mut value);
                value
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Rows before the requested page, capped at the largest SQLite integer
    pub fn skip(&self) -> u64 {
        let skip = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit);
        skip.min(i64::MAX as u64)
    }
}

/// A fully parsed list request
#[derive(Debug, Clone, Default)]
pub struct QueryFeatures {
    pub filters: Vec<Filter>,
    pub search: Vec<String>,
    pub geo: Option<GeoWithin>,
    /// Empty means `-createdAt`
    pub sort: Vec<SortKey>,
    pub fields: FieldSelection,
    pub pagination: Pagination,
}

impl QueryFeatures {
    /// Parse every feature from query pairs
    pub fn parse(params: &[(String, String)], schema: &'static EntitySchema) -> Result<Self, QueryError> {
        let mut features = Self::ordering(params, schema)?;

        for (key, value) in params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            features.filters.push(parse_filter(key, value, schema)?);
        }

        if !schema.search_columns.is_empty() {
            if let Some(raw) = param(params, "search") {
                features.search = raw.split_whitespace().map(str::to_string).collect();
            }
        }

        if schema.geo_columns.is_some() {
            features.geo = parse_geo(param(params, "latlng"), param(params, "distance"));
        }

        if let Some(raw) = param(params, "fields") {
            features.fields = parse_fields(raw)?;
        }

        Ok(features)
    }

    /// Parse only `sort`, `page` and `limit`; other parameters are ignored
    pub fn ordering(params: &[(String, String)], schema: &'static EntitySchema) -> Result<Self, QueryError> {
        let sort = match param(params, "sort") {
            Some(raw) => parse_sort(raw, schema)?,
            None => Vec::new(),
        };

        Ok(Self {
            sort,
            pagination: Pagination {
                page: parse_positive(param(params, "page")).unwrap_or(DEFAULT_PAGE),
                limit: parse_positive(param(params, "limit")).unwrap_or(DEFAULT_LIMIT),
            },
            ..Default::default()
        })
    }

    pub fn has_filter(&self, field: &str) -> bool {
        self.filters.iter().any(|f| f.field.name == field)
    }

    /// Add an equality filter unless the client already filters that field
    pub fn default_filter(
        &mut self,
        schema: &'static EntitySchema,
        field: &str,
        value: &str,
    ) -> Result<(), QueryError> {
        if !self.has_filter(field) {
            self.filters.push(parse_filter(field, value, schema)?);
        }
        Ok(())
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).filter(|v| *v >= 1)
}

fn parse_filter(key: &str, raw: &str, schema: &'static EntitySchema) -> Result<Filter, QueryError> {
    let captures = FILTER_KEY
        .captures(key)
        .ok_or_else(|| QueryError::UnknownFilter(key.to_string()))?;
    let name = captures.get(1).map(|m| m.as_str()).unwrap_or(key);
    let field = schema
        .field(name)
        .ok_or_else(|| QueryError::UnknownFilter(name.to_string()))?;

    let op = match captures.get(2) {
        Some(op) => {
            if !field.kind.supports_ranges() {
                return Err(QueryError::UnsupportedOperator {
                    field: name.to_string(),
                    op: op.as_str().to_string(),
                });
            }
            FilterOp::parse(op.as_str()).unwrap_or(FilterOp::Eq)
        }
        None => FilterOp::Eq,
    };

    let invalid = || QueryError::InvalidValue {
        field: name.to_string(),
        value: raw.to_string(),
    };
    let value = match field.kind {
        FieldKind::Text | FieldKind::TagList => FilterValue::Text(raw.to_string()),
        FieldKind::Id => {
            let id = uuid::Uuid::parse_str(raw.trim()).map_err(|_| invalid())?;
            FilterValue::Text(id.to_string())
        }
        FieldKind::Integer => FilterValue::Integer(raw.trim().parse().map_err(|_| invalid())?),
        FieldKind::Timestamp => FilterValue::Timestamp(parse_timestamp(raw.trim()).ok_or_else(invalid)?),
    };

    Ok(Filter { field, op, value })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_sort(raw: &str, schema: &'static EntitySchema) -> Result<Vec<SortKey>, QueryError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            let (name, descending) = match item.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (item.strip_prefix('+').unwrap_or(item), false),
            };
            schema
                .field(name)
                .filter(|f| f.sortable)
                .map(|field| SortKey { field, descending })
                .ok_or_else(|| QueryError::UnknownSort(name.to_string()))
        })
        .collect()
}

fn parse_fields(raw: &str) -> Result<FieldSelection, QueryError> {
    let items: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        return Ok(FieldSelection::All);
    }

    let excluded = items.iter().filter(|i| i.starts_with('-')).count();
    if excluded == items.len() {
        Ok(FieldSelection::Exclude(
            items.iter().map(|i| i.trim_start_matches('-').to_string()).collect(),
        ))
    } else if excluded == 0 {
        Ok(FieldSelection::Include(items.iter().map(|i| i.to_string()).collect()))
    } else {
        Err(QueryError::MixedFieldSelection)
    }
}

fn parse_geo(latlng: Option<&str>, distance: Option<&str>) -> Option<GeoWithin> {
    let (latlng, distance) = (latlng?, distance?);

    let Some((lat, lng)) = parse_latlng(latlng) else {
        warn!("Invalid latlng format for geospatial query: {}", latlng);
        return None;
    };
    let Some(center) = GeoPoint::new(lng, lat) else {
        warn!("Out of range latlng for geospatial query: {}", latlng);
        return None;
    };
    let radius_km = match distance.trim().parse::<f64>() {
        Ok(km) if km.is_finite() && km > 0.0 => km,
        _ => {
            warn!("Invalid distance for geospatial query: {}", distance);
            return None;
        }
    };

    Some(GeoWithin {
        center,
        radius_radians: radius_km / EARTH_RADIUS_KM,
    })
}
