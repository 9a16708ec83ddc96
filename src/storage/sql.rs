//! Rendering of [`QueryFeatures`] and partial updates into SQL

use crate::core::query::{EntitySchema, FieldKind, FilterValue, Pagination, QueryFeatures};
use crate::storage::{ts, GEO_ANGLE_FN};
use rusqlite::types::Value as SqlValue;

/// WHERE conditions with their positional parameters
#[derive(Debug, Default)]
pub(crate) struct SqlQuery {
    conditions: Vec<String>,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(&mut self, sql: impl Into<String>, params: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(sql.into());
        self.params.extend(params);
    }

    /// Add the filter, search and geo parts of `features`
    pub fn apply(&mut self, features: &QueryFeatures, schema: &EntitySchema) {
        for filter in &features.filters {
            let value = match &filter.value {
                FilterValue::Text(s) => SqlValue::Text(s.clone()),
                FilterValue::Integer(n) => SqlValue::Integer(*n),
                FilterValue::Timestamp(t) => SqlValue::Text(ts(t)),
            };
            let sql = match filter.field.kind {
                FieldKind::TagList => format!(
                    "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value = ?)",
                    filter.field.column
                ),
                _ => format!("{} {} ?", filter.field.column, filter.op.sql()),
            };
            self.condition(sql, [value]);
        }

        if !features.search.is_empty() && !schema.search_columns.is_empty() {
            let mut any_term = Vec::new();
            let mut params = Vec::new();
            for term in &features.search {
                let pattern = format!("%{}%", escape_like(term));
                for column in schema.search_columns {
                    any_term.push(format!("{} LIKE ? ESCAPE '\\'", column));
                    params.push(SqlValue::Text(pattern.clone()));
                }
            }
            self.condition(format!("({})", any_term.join(" OR ")), params);
        }

        if let (Some(geo), Some((lng, lat))) = (&features.geo, schema.geo_columns) {
            self.condition(
                format!("{}(?, ?, {}, {}) <= ?", GEO_ANGLE_FN, lat, lng),
                [
                    SqlValue::Real(geo.center.latitude),
                    SqlValue::Real(geo.center.longitude),
                    SqlValue::Real(geo.radius_radians),
                ],
            );
        }
    }

    /// ` WHERE ...` or an empty string
    pub fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// ORDER BY body: requested keys (or `-createdAt`), then newest insertion first
pub(crate) fn order_by(features: &QueryFeatures, schema: &EntitySchema) -> String {
    let mut keys: Vec<String> = features
        .sort
        .iter()
        .map(|key| {
            format!(
                "{} {}",
                key.field.column,
                if key.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();

    if keys.is_empty() {
        if let Some(created) = schema.field("createdAt") {
            keys.push(format!("{} DESC", created.column));
        }
    }
    // insertion order breaks ties in the direction of the last key
    let ascending = features.sort.last().is_some_and(|key| !key.descending);
    keys.push(format!(
        "{} {}",
        schema.tiebreak_column,
        if ascending { "ASC" } else { "DESC" }
    ));
    keys.join(", ")
}

pub(crate) fn limit_offset(pagination: &Pagination) -> String {
    format!(" LIMIT {} OFFSET {}", pagination.limit, pagination.skip())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// SET list for a partial UPDATE
#[derive(Debug, Default)]
pub(crate) struct Assignments {
    sets: Vec<String>,
    pub params: Vec<SqlValue>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: SqlValue) {
        self.sets.push(format!("{} = ?", column));
        self.params.push(value);
    }

    pub fn set_text(&mut self, column: &str, value: Option<&str>) {
        let value = value.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string()));
        self.set(column, value);
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn sql(&self) -> String {
        self.sets.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::query::FieldSpec;

    static FIELDS: &[FieldSpec] = &[
        FieldSpec {
            name: "status",
            column: "l.status",
            kind: FieldKind::Text,
            sortable: true,
        },
        FieldSpec {
            name: "tags",
            column: "l.tags",
            kind: FieldKind::TagList,
            sortable: false,
        },
        FieldSpec {
            name: "createdAt",
            column: "l.created_at",
            kind: FieldKind::Timestamp,
            sortable: true,
        },
    ];
    static SCHEMA: EntitySchema = EntitySchema::new(
        FIELDS,
        &["l.title", "l.tags"],
        Some(("l.longitude", "l.latitude")),
        "l.rowid",
    );

    fn features(items: &[(&str, &str)]) -> QueryFeatures {
        let params: Vec<(String, String)> = items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QueryFeatures::parse(&params, &SCHEMA).unwrap()
    }

    #[test]
    fn test_empty_features_render_nothing() {
        let mut query = SqlQuery::new();
        query.apply(&features(&[]), &SCHEMA);
        assert_eq!(query.where_sql(), "");
        assert!(query.params.is_empty());
        assert_eq!(order_by(&features(&[]), &SCHEMA), "l.created_at DESC, l.rowid DESC");
    }

    #[test]
    fn test_filters_and_search() {
        let mut query = SqlQuery::new();
        query.apply(
            &features(&[("status", "active"), ("tags", "rust"), ("search", "50% off")]),
            &SCHEMA,
        );
        let sql = query.where_sql();
        assert!(sql.starts_with(" WHERE l.status = ? AND EXISTS (SELECT 1 FROM json_each(l.tags)"));
        assert!(sql.contains("l.title LIKE ? ESCAPE '\\' OR l.tags LIKE ?"));
        // 2 filters + 2 terms x 2 columns
        assert_eq!(query.params.len(), 6);
        assert_eq!(query.params[2], SqlValue::Text("%50\\%%".to_string()));
    }

    #[test]
    fn test_geo_condition() {
        let mut query = SqlQuery::new();
        query.apply(&features(&[("latlng", "1,2"), ("distance", "10")]), &SCHEMA);
        assert_eq!(
            query.where_sql(),
            " WHERE geo_central_angle(?, ?, l.latitude, l.longitude) <= ?"
        );
        assert_eq!(query.params[0], SqlValue::Real(1.0));
        assert_eq!(query.params[1], SqlValue::Real(2.0));
    }

    #[test]
    fn test_explicit_sort_and_paging() {
        let f = features(&[("sort", "status,-createdAt"), ("page", "3"), ("limit", "5")]);
        assert_eq!(
            order_by(&f, &SCHEMA),
            "l.status ASC, l.created_at DESC, l.rowid DESC"
        );
        assert_eq!(limit_offset(&f.pagination), " LIMIT 5 OFFSET 10");

        let f = features(&[("page", "4294967295"), ("limit", "4294967295")]);
        assert_eq!(
            limit_offset(&f.pagination),
            format!(" LIMIT 4294967295 OFFSET {}", i64::MAX)
        );

        let f = features(&[("sort", "createdAt")]);
        assert_eq!(order_by(&f, &SCHEMA), "l.created_at ASC, l.rowid ASC");
    }

    #[test]
    fn test_assignments() {
        let mut sets = Assignments::new();
        assert!(sets.is_empty());
        sets.set_text("bio", None);
        sets.set("num_reviews", SqlValue::Integer(2));
        assert_eq!(sets.sql(), "bio = ?, num_reviews = ?");
        assert_eq!(sets.params[0], SqlValue::Null);
    }
}
