//! SQL query builder for entity schemas
//!
//! Compiles resolved [`QueryOptions`] into parameterized SQLite statements.
//! Identifiers always come from the static schema and are double-quoted;
//! every caller value is bound through a numbered `?N` placeholder.

use super::schema::{EntitySchema, RelationKind};
use super::store::StoreError;
use crate::query::{FieldPredicate, OrderSpec, Pagination, Predicate, Scalar};
use chrono::SecondsFormat;

const ROOT_ALIAS: &str = "t0";

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a SQLx query
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Convert a record field for writing
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => Some(SqlValue::Null),
            serde_json::Value::Bool(b) => Some(SqlValue::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(SqlValue::Int(i)),
                None => n.as_f64().map(SqlValue::Float),
            },
            serde_json::Value::String(s) => Some(SqlValue::String(s.clone())),
            _ => None,
        }
    }
}

impl From<&Scalar> for SqlValue {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Null => SqlValue::Null,
            Scalar::Bool(b) => SqlValue::Bool(*b),
            Scalar::Int(i) => SqlValue::Int(*i),
            Scalar::Float(f) => SqlValue::Float(*f),
            Scalar::Text(s) => SqlValue::String(s.clone()),
            Scalar::Date(d) => SqlValue::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Quote an SQL identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A SELECT / COUNT statement under construction.
///
/// Soft-deleted rows are filtered from the start; callers only add
/// conditions on top.
#[derive(Debug)]
pub struct SelectQuery<'s> {
    schema: &'s EntitySchema,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    subquery_counter: usize,
}

impl<'s> SelectQuery<'s> {
    pub fn new(schema: &'s EntitySchema) -> Self {
        let mut where_clauses = Vec::new();
        if let Some(column) = schema.soft_delete_column() {
            where_clauses.push(format!("{} IS NULL", quote(column)));
        }
        Self {
            schema,
            where_clauses,
            values: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            subquery_counter: 0,
        }
    }

    /// AND a predicate onto the WHERE clause.
    pub fn filter(mut self, predicate: &Predicate) -> Result<Self, StoreError> {
        if !predicate.is_match_all() {
            let condition = self.compile_predicate(self.schema, predicate)?;
            self.where_clauses.push(condition);
        }
        Ok(self)
    }

    /// Restrict `column` to a set of values (relation loading).
    pub fn where_in(mut self, column: &str, values: Vec<SqlValue>) -> Result<Self, StoreError> {
        ensure_column(self.schema, column)?;
        let condition = self.in_clause(&quote(column), values);
        self.where_clauses.push(condition);
        Ok(self)
    }

    /// Apply caller ordering; keys must be root columns or `relation.column`.
    pub fn order_by(mut self, order: &OrderSpec) -> Result<Self, StoreError> {
        for (key, direction) in order.iter() {
            let expr = match key.split_once('.') {
                None => {
                    ensure_column(self.schema, key)?;
                    format!("{}.{}", ROOT_ALIAS, quote(key))
                }
                Some((relation, column)) => self.related_sort_expr(relation, column)?,
            };
            self.order_clauses.push(format!("{} {}", expr, direction.to_sql()));
        }
        Ok(self)
    }

    /// Order by primary key when nothing else was requested.
    pub fn default_order(mut self) -> Self {
        if self.order_clauses.is_empty() {
            self.order_clauses
                .push(format!("{}.{} ASC", ROOT_ALIAS, quote(self.schema.primary_key)));
        }
        self
    }

    pub fn paginate(mut self, pagination: Option<Pagination>) -> Self {
        if let Some(page) = pagination {
            self.limit = Some(page.take());
            self.offset = Some(page.skip());
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Build the SELECT statement for the given columns.
    pub fn build_select(&self, columns: &[&str]) -> Result<String, StoreError> {
        let mut projected = Vec::with_capacity(columns.len());
        for column in columns {
            ensure_column(self.schema, column)?;
            projected.push(format!("{}.{}", ROOT_ALIAS, quote(column)));
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            projected.join(", "),
            quote(self.schema.table),
            ROOT_ALIAS
        );
        self.push_where(&mut sql);

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        Ok(sql)
    }

    /// Build a COUNT statement over the same conditions.
    pub fn build_count(&self) -> String {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} AS {}",
            quote(self.schema.table),
            ROOT_ALIAS
        );
        self.push_where(&mut sql);
        sql
    }

    fn push_where(&self, sql: &mut String) {
        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&join_parts(self.where_clauses.clone(), " AND ", "1 = 1"));
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }

    fn in_clause(&mut self, column: &str, values: Vec<SqlValue>) -> String {
        if values.is_empty() {
            return "1 = 0".to_string();
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        format!("{} IN ({})", column, placeholders.join(", "))
    }

    fn compile_predicate(
        &mut self,
        schema: &EntitySchema,
        predicate: &Predicate,
    ) -> Result<String, StoreError> {
        match predicate {
            Predicate::All { fields, groups } => {
                let mut parts = Vec::with_capacity(fields.len() + groups.len());
                for (name, field) in fields {
                    parts.push(self.compile_field(schema, name, field)?);
                }
                for group in groups {
                    parts.push(self.compile_predicate(schema, group)?);
                }
                Ok(join_parts(parts, " AND ", "1 = 1"))
            }
            Predicate::Any(branches) => {
                let mut parts = Vec::with_capacity(branches.len());
                for branch in branches {
                    parts.push(self.compile_predicate(schema, branch)?);
                }
                Ok(join_parts(parts, " OR ", "1 = 0"))
            }
            Predicate::Not(inner) => Ok(format!("NOT ({})", self.compile_predicate(schema, inner)?)),
        }
    }

    fn compile_field(
        &mut self,
        schema: &EntitySchema,
        name: &str,
        field: &FieldPredicate,
    ) -> Result<String, StoreError> {
        if let FieldPredicate::Related(inner) = field {
            return self.compile_related(schema, name, inner);
        }

        ensure_column(schema, name)?;
        let column = quote(name);
        let sql = match field {
            FieldPredicate::Eq(Scalar::Null) | FieldPredicate::IsNull => format!("{} IS NULL", column),
            FieldPredicate::Ne(Scalar::Null) | FieldPredicate::IsNotNull => {
                format!("{} IS NOT NULL", column)
            }
            FieldPredicate::Eq(v) => format!("{} = {}", column, self.bind(v.into())),
            FieldPredicate::Ne(v) => format!("{} <> {}", column, self.bind(v.into())),
            FieldPredicate::ILike(pattern) => {
                format!("{} REGEXP {}", column, self.bind(SqlValue::String(like_to_regex(pattern))))
            }
            FieldPredicate::In(values) => {
                self.in_clause(&column, values.iter().map(SqlValue::from).collect())
            }
            FieldPredicate::Between(low, high) => {
                let low = self.bind(low.into());
                let high = self.bind(high.into());
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            FieldPredicate::Gt(v) => format!("{} > {}", column, self.bind(v.into())),
            FieldPredicate::Gte(v) => format!("{} >= {}", column, self.bind(v.into())),
            FieldPredicate::Lt(v) => format!("{} < {}", column, self.bind(v.into())),
            FieldPredicate::Lte(v) => format!("{} <= {}", column, self.bind(v.into())),
            FieldPredicate::Related(inner) => self.compile_related(schema, name, inner)?,
        };
        Ok(sql)
    }

    /// `local IN (SELECT pk ...)` for BelongsTo, `pk IN (SELECT fk ...)` for HasMany
    fn compile_related(
        &mut self,
        schema: &EntitySchema,
        name: &str,
        inner: &Predicate,
    ) -> Result<String, StoreError> {
        let relation = schema
            .relation(name)
            .ok_or_else(|| StoreError::InvalidQuery(format!("unknown relation `{}`", name)))?;
        let target = relation.target();

        let (outer_key, inner_key) = match relation.kind {
            RelationKind::BelongsTo { local_key } => (local_key, target.primary_key),
            RelationKind::HasMany { foreign_key } => (schema.primary_key, foreign_key),
        };

        let mut conditions = Vec::new();
        if let Some(column) = target.soft_delete_column() {
            conditions.push(format!("{} IS NULL", quote(column)));
        }
        if !inner.is_match_all() {
            conditions.push(self.compile_predicate(target, inner)?);
        }

        let mut sql = format!(
            "{} IN (SELECT {} FROM {}",
            quote(outer_key),
            quote(inner_key),
            quote(target.table)
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&join_parts(conditions, " AND ", "1 = 1"));
        }
        sql.push(')');
        Ok(sql)
    }

    /// Correlated sub-select over a BelongsTo relation
    fn related_sort_expr(&mut self, relation: &str, column: &str) -> Result<String, StoreError> {
        let schema = self.schema;
        let rel = schema
            .relation(relation)
            .ok_or_else(|| StoreError::InvalidQuery(format!("unknown relation `{}`", relation)))?;
        let RelationKind::BelongsTo { local_key } = rel.kind else {
            return Err(StoreError::InvalidQuery(format!(
                "cannot sort by to-many relation `{}`",
                relation
            )));
        };
        let target = rel.target();
        ensure_column(target, column)?;

        self.subquery_counter += 1;
        let alias = format!("s{}", self.subquery_counter);
        let mut sql = format!(
            "(SELECT {alias}.{col} FROM {table} AS {alias} WHERE {alias}.{pk} = {root}.{local}",
            alias = alias,
            col = quote(column),
            table = quote(target.table),
            pk = quote(target.primary_key),
            root = ROOT_ALIAS,
            local = quote(local_key),
        );
        if let Some(deleted) = target.soft_delete_column() {
            sql.push_str(&format!(" AND {}.{} IS NULL", alias, quote(deleted)));
        }
        sql.push(')');
        Ok(sql)
    }
}

/// `%`/`_` wildcard pattern to an anchored, case-insensitive regex. SQLite's
/// own LIKE only folds ASCII case.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::from("(?is)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
                regex.push_str(if c == '%' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    regex.push_str(&regex::escape(&literal));
    regex.push('$');
    regex
}

fn join_parts(parts: Vec<String>, separator: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => parts
            .iter()
            .map(|p| format!("({})", p))
            .collect::<Vec<_>>()
            .join(separator),
    }
}

fn ensure_column(schema: &EntitySchema, column: &str) -> Result<(), StoreError> {
    if schema.has_column(column) {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!(
            "unknown column `{}` on {}",
            column, schema.table
        )))
    }
}

/// `INSERT ... RETURNING` for the given column values.
pub fn build_insert(schema: &EntitySchema, values: &[(&str, SqlValue)]) -> Result<String, StoreError> {
    let returning = returning_clause(schema);
    if values.is_empty() {
        return Ok(format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quote(schema.table),
            returning
        ));
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (i, (column, _)) in values.iter().enumerate() {
        ensure_column(schema, column)?;
        columns.push(quote(column));
        placeholders.push(format!("?{}", i + 1));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quote(schema.table),
        columns.join(", "),
        placeholders.join(", "),
        returning
    ))
}

/// `UPDATE ... WHERE pk = ?N RETURNING`; the key is bound last.
pub fn build_update(schema: &EntitySchema, values: &[(&str, SqlValue)]) -> Result<String, StoreError> {
    let mut assignments = Vec::with_capacity(values.len());
    for (i, (column, _)) in values.iter().enumerate() {
        ensure_column(schema, column)?;
        assignments.push(format!("{} = ?{}", quote(column), i + 1));
    }
    if assignments.is_empty() {
        // touch nothing but still return the row
        assignments.push(format!("{pk} = {pk}", pk = quote(schema.primary_key)));
    }

    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?{} RETURNING {}",
        quote(schema.table),
        assignments.join(", "),
        quote(schema.primary_key),
        values.len() + 1,
        returning_clause(schema)
    ))
}

pub fn build_delete(schema: &EntitySchema) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote(schema.table),
        quote(schema.primary_key)
    )
}

fn returning_clause(schema: &EntitySchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{category, product};
    use crate::query::{OrderSpec, PageLimits, SortDirection};
    use pretty_assertions::assert_eq;

    fn all(fields: Vec<(&str, FieldPredicate)>) -> Predicate {
        Predicate::All {
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_soft_delete_filter_is_always_present() {
        let q = SelectQuery::new(product::schema());
        assert_eq!(
            q.build_count(),
            r#"SELECT COUNT(*) FROM "products" AS t0 WHERE "deletedAt" IS NULL"#
        );

        let q = SelectQuery::new(category::schema());
        assert_eq!(q.build_count(), r#"SELECT COUNT(*) FROM "categories" AS t0"#);
    }

    #[test]
    fn test_field_predicates_bind_in_order() {
        let predicate = all(vec![
            ("name", FieldPredicate::ILike("%milk%".into())),
            ("price", FieldPredicate::Between(Scalar::Int(1), Scalar::Int(5))),
            ("photoId", FieldPredicate::IsNull),
        ]);
        let q = SelectQuery::new(product::schema()).filter(&predicate).unwrap();
        assert_eq!(
            q.build_count(),
            concat!(
                r#"SELECT COUNT(*) FROM "products" AS t0 WHERE ("deletedAt" IS NULL)"#,
                r#" AND (("name" REGEXP ?1) AND ("price" BETWEEN ?2 AND ?3) AND ("photoId" IS NULL))"#
            )
        );
        assert_eq!(
            q.values(),
            &[
                SqlValue::String("(?is)^.*milk.*$".into()),
                SqlValue::Int(1),
                SqlValue::Int(5)
            ]
        );
    }

    #[test]
    fn test_like_patterns_become_anchored_regexes() {
        assert_eq!(like_to_regex("%сыр%"), "(?is)^.*сыр.*$");
        assert_eq!(like_to_regex("mo%"), "(?is)^mo.*$");
        assert_eq!(like_to_regex("%1.5 (x)"), r"(?is)^.*1\.5 \(x\)$");
        assert_eq!(like_to_regex("a_c"), "(?is)^a.c$");

        let re = regex::Regex::new(&like_to_regex("%сыр%")).unwrap();
        assert!(re.is_match("Сыр Российский"));
        assert!(!re.is_match("Whole milk"));
    }

    #[test]
    fn test_or_stays_inside_soft_delete_guard() {
        let predicate = Predicate::Any(vec![
            Predicate::eq("id", Scalar::Int(1)),
            Predicate::Not(Box::new(Predicate::eq("inStock", Scalar::Bool(true)))),
        ]);
        let q = SelectQuery::new(product::schema()).filter(&predicate).unwrap();
        assert_eq!(
            q.build_count(),
            concat!(
                r#"SELECT COUNT(*) FROM "products" AS t0 WHERE ("deletedAt" IS NULL)"#,
                r#" AND (("id" = ?1) OR (NOT ("inStock" = ?2)))"#
            )
        );
        assert_eq!(q.values(), &[SqlValue::Int(1), SqlValue::Bool(true)]);
    }

    #[test]
    fn test_match_all_adds_nothing() {
        let q = SelectQuery::new(category::schema()).filter(&Predicate::match_all()).unwrap();
        assert_eq!(q.build_count(), r#"SELECT COUNT(*) FROM "categories" AS t0"#);
        assert!(q.values().is_empty());

        let q = SelectQuery::new(category::schema()).filter(&Predicate::Any(Vec::new())).unwrap();
        assert_eq!(q.build_count(), r#"SELECT COUNT(*) FROM "categories" AS t0 WHERE 1 = 0"#);
    }

    #[test]
    fn test_empty_in_and_null_equality() {
        let q = SelectQuery::new(category::schema())
            .filter(&all(vec![("id", FieldPredicate::In(Vec::new()))]))
            .unwrap();
        assert_eq!(q.build_count(), r#"SELECT COUNT(*) FROM "categories" AS t0 WHERE 1 = 0"#);

        let predicate = all(vec![
            ("id", FieldPredicate::In(Vec::new())),
            ("photoId", FieldPredicate::Eq(Scalar::Null)),
        ]);
        let q = SelectQuery::new(product::schema()).filter(&predicate).unwrap();
        assert!(q.build_count().ends_with(r#"AND ((1 = 0) AND ("photoId" IS NULL))"#));
        assert!(q.values().is_empty());
    }

    #[test]
    fn test_related_belongs_to_and_has_many() {
        let predicate = all(vec![(
            "category",
            FieldPredicate::Related(Box::new(Predicate::eq("name", Scalar::from("Dairy")))),
        )]);
        let q = SelectQuery::new(product::schema()).filter(&predicate).unwrap();
        assert!(q.build_count().ends_with(
            r#"AND ("categoryId" IN (SELECT "id" FROM "categories" WHERE "name" = ?1))"#
        ));

        let predicate = all(vec![(
            "products",
            FieldPredicate::Related(Box::new(Predicate::eq("inStock", Scalar::Bool(true)))),
        )]);
        let q = SelectQuery::new(category::schema()).filter(&predicate).unwrap();
        assert_eq!(
            q.build_count(),
            concat!(
                r#"SELECT COUNT(*) FROM "categories" AS t0 WHERE "id" IN"#,
                r#" (SELECT "categoryId" FROM "products" WHERE ("deletedAt" IS NULL) AND ("inStock" = ?1))"#
            )
        );
    }

    #[test]
    fn test_where_in() {
        let q = SelectQuery::new(category::schema())
            .where_in("parentId", vec![SqlValue::Int(1), SqlValue::Int(2)])
            .unwrap();
        assert_eq!(
            q.build_count(),
            r#"SELECT COUNT(*) FROM "categories" AS t0 WHERE "parentId" IN (?1, ?2)"#
        );
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let predicate = Predicate::eq("1=1; DROP TABLE products; --", Scalar::Int(1));
        assert!(SelectQuery::new(product::schema()).filter(&predicate).is_err());
    }

    #[test]
    fn test_select_with_order_and_pagination() {
        let order = OrderSpec(vec![
            ("category.name".to_string(), SortDirection::Asc),
            ("price".to_string(), SortDirection::Desc),
        ]);
        let page = Pagination::new(Some(3), Some(5), PageLimits::default());
        let q = SelectQuery::new(product::schema())
            .order_by(&order)
            .unwrap()
            .default_order()
            .paginate(Some(page));
        assert_eq!(
            q.build_select(&["id", "name"]).unwrap(),
            concat!(
                r#"SELECT t0."id", t0."name" FROM "products" AS t0 WHERE "deletedAt" IS NULL"#,
                r#" ORDER BY (SELECT s1."name" FROM "categories" AS s1 WHERE s1."id" = t0."categoryId") ASC,"#,
                r#" t0."price" DESC LIMIT 5 OFFSET 10"#
            )
        );
    }

    #[test]
    fn test_default_order_is_primary_key() {
        let q = SelectQuery::new(category::schema()).default_order().limit(1);
        assert_eq!(
            q.build_select(&["id"]).unwrap(),
            r#"SELECT t0."id" FROM "categories" AS t0 ORDER BY t0."id" ASC LIMIT 1"#
        );
    }

    #[test]
    fn test_write_statements() {
        let sql = build_insert(
            category::schema(),
            &[("name", SqlValue::String("Dairy".into())), ("parentId", SqlValue::Null)],
        )
        .unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "categories" ("name", "parentId") VALUES (?1, ?2) RETURNING "id", "name", "parentId""#
        );

        let sql = build_update(category::schema(), &[("name", SqlValue::String("Milk".into()))]).unwrap();
        assert_eq!(
            sql,
            r#"UPDATE "categories" SET "name" = ?1 WHERE "id" = ?2 RETURNING "id", "name", "parentId""#
        );

        assert_eq!(build_delete(category::schema()), r#"DELETE FROM "categories" WHERE "id" = ?1"#);
    }
}
