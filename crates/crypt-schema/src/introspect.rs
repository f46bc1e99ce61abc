//! Reads the live schema from the database catalog.
//!
//! Each dialect has its own catalog queries; results are normalized into
//! the same [`DatabaseSchema`] model the builder produces. Catalog values
//! are cast to text or plain integers so every driver can decode them
//! through `sqlx::Any`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::builder::generate_identifier;
use crate::database::Database;
use crate::dialect::DialectKind;
use crate::error::{Result, SchemaError};
use crate::schema::{
    ColumnSchema, ColumnType, DatabaseSchema, DefaultValue, ForeignKeyAction, ForeignKeySchema,
    IndexSchema, PrimaryKey, SequenceSchema, TableSchema,
};

/// The schema PostgreSQL tables live in unless qualified.
const DEFAULT_NAMESPACE: &str = "public";

fn catalog<T>(result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    result.map_err(SchemaError::Introspection)
}

/// Reads tables, sequences and namespaces.
pub(crate) async fn introspect(db: &Database) -> Result<DatabaseSchema> {
    let kind = db.dialect().kind();
    let mut schema = DatabaseSchema::seeded(sequences(db).await?, namespaces(db).await?);

    for name in table_names(db).await? {
        let table = match kind {
            DialectKind::Sqlite => sqlite_table(db, &name).await?,
            DialectKind::Postgres => postgres_table(db, &name).await?,
            DialectKind::MySql => mysql_table(db, &name).await?,
        };
        debug!(table = %name, columns = table.columns.len(), "Introspected table");
        schema.insert_table(table);
    }

    Ok(schema)
}

/// Names of all user tables, sorted.
pub(crate) async fn table_names(db: &Database) -> Result<Vec<String>> {
    let pool = db.pool();
    let names = match db.dialect().kind() {
        DialectKind::Sqlite => {
            let rows: Vec<(String,)> = catalog(
                sqlx::query_as(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .fetch_all(pool)
                .await,
            )?;
            rows.into_iter().map(|(name,)| name).collect()
        }
        DialectKind::Postgres => {
            let rows: Vec<(String, String)> = catalog(
                sqlx::query_as(
                    "SELECT table_schema::text, table_name::text FROM information_schema.tables \
                     WHERE table_type = 'BASE TABLE' \
                     AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                     ORDER BY table_schema, table_name",
                )
                .fetch_all(pool)
                .await,
            )?;
            rows.into_iter()
                .map(|(namespace, name)| qualify(&namespace, &name))
                .collect()
        }
        DialectKind::MySql => {
            let rows: Vec<(String,)> = catalog(
                sqlx::query_as(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                     ORDER BY TABLE_NAME",
                )
                .fetch_all(pool)
                .await,
            )?;
            rows.into_iter().map(|(name,)| name).collect()
        }
    };
    Ok(names)
}

/// Live sequences; empty when the dialect has none.
pub(crate) async fn sequences(db: &Database) -> Result<Vec<SequenceSchema>> {
    if !db.dialect().supports_sequences() {
        return Ok(Vec::new());
    }
    let rows: Vec<(String, String, String, String)> = catalog(
        sqlx::query_as(
            "SELECT sequence_schema::text, sequence_name::text, start_value::text, increment::text \
             FROM information_schema.sequences ORDER BY sequence_schema, sequence_name",
        )
        .fetch_all(db.pool())
        .await,
    )?;
    Ok(rows
        .into_iter()
        .map(|(namespace, name, start, increment)| SequenceSchema {
            name: qualify(&namespace, &name),
            start: start.parse().unwrap_or(1),
            increment: increment.parse().unwrap_or(1),
        })
        .collect())
}

/// Live namespaces; empty when the dialect has none.
pub(crate) async fn namespaces(db: &Database) -> Result<Vec<String>> {
    if !db.dialect().supports_namespaces() {
        return Ok(Vec::new());
    }
    let rows: Vec<(String,)> = catalog(
        sqlx::query_as(
            "SELECT nspname::text FROM pg_catalog.pg_namespace \
             WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' \
             ORDER BY nspname",
        )
        .fetch_all(db.pool())
        .await,
    )?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn split_qualified(name: &str) -> (&str, &str) {
    name.split_once('.').unwrap_or((DEFAULT_NAMESPACE, name))
}

/// Type facts parsed from a declared SQL type such as `VARCHAR(255)` or
/// `int(10) unsigned`.
#[derive(Debug, Clone, PartialEq)]
struct TypeSpec {
    column_type: ColumnType,
    length: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
    unsigned: bool,
    fixed: bool,
}

impl TypeSpec {
    fn of(column_type: ColumnType) -> Self {
        Self {
            column_type,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            fixed: false,
        }
    }

    fn into_column(self, name: String) -> ColumnSchema {
        let mut column = ColumnSchema::new(name, self.column_type);
        column.length = self.length;
        column.precision = self.precision;
        column.scale = self.scale;
        column.unsigned = self.unsigned;
        column.fixed = self.fixed;
        column
    }
}

fn parse_declared_type(declared: &str) -> TypeSpec {
    let lower = declared.trim().to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");
    let (base, args) = match lower.split_once('(') {
        Some((base, rest)) => {
            let inner = rest.split(')').next().unwrap_or_default();
            let args: Vec<u32> = inner
                .split(',')
                .filter_map(|a| a.trim().parse().ok())
                .collect();
            (base.trim().to_string(), args)
        }
        None => (
            lower
                .replace("unsigned", "")
                .replace("zerofill", "")
                .trim()
                .to_string(),
            Vec::new(),
        ),
    };
    let first = args.first().copied();

    let mut spec = match base.as_str() {
        "tinyint" if first == Some(1) => TypeSpec::of(ColumnType::Boolean),
        "tinyint" | "smallint" | "int2" => TypeSpec::of(ColumnType::SmallInt),
        "mediumint" | "int" | "integer" | "int4" => TypeSpec::of(ColumnType::Integer),
        "bigint" | "int8" => TypeSpec::of(ColumnType::BigInt),
        "numeric" | "decimal" => TypeSpec {
            precision: first.and_then(|p| u8::try_from(p).ok()),
            scale: args.get(1).and_then(|s| u8::try_from(*s).ok()),
            ..TypeSpec::of(ColumnType::Decimal)
        },
        "double precision" | "double" | "float" | "real" | "float8" => {
            TypeSpec::of(ColumnType::Float)
        }
        "varchar" | "character varying" | "nvarchar" => TypeSpec {
            length: first,
            ..TypeSpec::of(ColumnType::String)
        },
        "char" | "character" | "nchar" | "bpchar" => TypeSpec {
            length: first,
            fixed: true,
            ..TypeSpec::of(ColumnType::String)
        },
        "varbinary" | "binary" => TypeSpec {
            length: first,
            ..TypeSpec::of(ColumnType::Binary)
        },
        "blob" | "longblob" | "mediumblob" | "tinyblob" | "bytea" => TypeSpec::of(ColumnType::Blob),
        "boolean" | "bool" => TypeSpec::of(ColumnType::Boolean),
        "date" => TypeSpec::of(ColumnType::Date),
        "datetime" | "timestamp" | "timestamp without time zone" => {
            TypeSpec::of(ColumnType::DateTime)
        }
        "timestamptz" | "timestamp with time zone" => TypeSpec::of(ColumnType::DateTimeTz),
        "time" | "time without time zone" => TypeSpec::of(ColumnType::Time),
        "json" | "jsonb" => TypeSpec::of(ColumnType::Json),
        "uuid" => TypeSpec::of(ColumnType::Guid),
        "clob" | "text" | "longtext" | "mediumtext" | "tinytext" | "" => {
            TypeSpec::of(ColumnType::Text)
        }
        other => {
            debug!(declared_type = other, "Unrecognized column type, treating as text");
            TypeSpec::of(ColumnType::Text)
        }
    };
    spec.unsigned = unsigned
        && (spec.column_type.is_integer()
            || matches!(spec.column_type, ColumnType::Decimal | ColumnType::Float));
    spec
}

async fn sqlite_table(db: &Database, name: &str) -> Result<TableSchema> {
    let pool = db.pool();
    let (create_sql,): (Option<String>,) = catalog(
        sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool)
            .await,
    )?;
    let autoincrement = create_sql
        .as_deref()
        .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"));

    let rows: Vec<(String, String, i64, Option<String>, i64)> = catalog(
        sqlx::query_as(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;

    let mut key: Vec<(i64, String)> = rows
        .iter()
        .filter(|row| row.4 > 0)
        .map(|row| (row.4, row.0.clone()))
        .collect();
    key.sort();

    let mut table = TableSchema::new(name);
    for (column_name, declared, not_null, default, pk) in rows {
        let mut column = parse_declared_type(&declared).into_column(column_name);
        column.nullable = not_null == 0 && pk == 0;
        column.default = default
            .as_deref()
            .map_or(DefaultValue::None, DefaultValue::from_catalog);
        column.auto_increment =
            autoincrement && pk > 0 && key.len() == 1 && column.column_type.is_integer();
        table.columns.push(column);
    }
    if !key.is_empty() {
        table.primary_key = Some(PrimaryKey {
            name: None,
            columns: key.into_iter().map(|(_, column)| column).collect(),
        });
    }

    let indexes: Vec<(String, i64, String, i64)> = catalog(
        sqlx::query_as(
            "SELECT name, \"unique\", origin, partial FROM pragma_index_list(?) ORDER BY name",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;
    for (index_name, unique, origin, partial) in indexes {
        if origin == "pk" {
            continue;
        }
        let columns: Vec<(Option<String>,)> = catalog(
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&index_name)
                .fetch_all(pool)
                .await,
        )?;
        let mut index = IndexSchema::new(
            index_name.clone(),
            columns.into_iter().filter_map(|(c,)| c).collect(),
        );
        index.unique = unique != 0;
        if partial != 0 {
            let (index_sql,): (Option<String>,) = catalog(
                sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?")
                    .bind(&index_name)
                    .fetch_one(pool)
                    .await,
            )?;
            if let Some(condition) = index_sql.as_deref().and_then(where_clause) {
                index.options.insert("where".to_string(), condition);
            }
        }
        table.indexes.push(index);
    }

    let fk_rows: Vec<(i64, String, String, Option<String>, String, String)> = catalog(
        sqlx::query_as(
            "SELECT id, \"table\", \"from\", \"to\", on_update, on_delete \
             FROM pragma_foreign_key_list(?) ORDER BY id, seq",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;
    let mut grouped: Vec<(i64, ForeignKeySchema)> = Vec::new();
    for (id, foreign_table, from, to, on_update, on_delete) in fk_rows {
        match grouped.last_mut() {
            Some((last_id, fk)) if *last_id == id => {
                fk.columns.push(from);
                fk.references_columns.push(to.unwrap_or_default());
            }
            _ => grouped.push((
                id,
                ForeignKeySchema {
                    name: String::new(),
                    columns: vec![from],
                    references_table: foreign_table,
                    references_columns: vec![to.unwrap_or_default()],
                    on_delete: ForeignKeyAction::parse(&on_delete).unwrap_or_default(),
                    on_update: ForeignKeyAction::parse(&on_update).unwrap_or_default(),
                },
            )),
        }
    }
    // SQLite does not keep constraint names; use the generated ones.
    table.foreign_keys = grouped
        .into_iter()
        .map(|(_, mut fk)| {
            fk.name = generate_identifier("FK", name, &fk.columns);
            fk
        })
        .collect();

    Ok(table)
}

fn where_clause(sql: &str) -> Option<String> {
    let upper = sql.to_ascii_uppercase();
    let position = upper.rfind(" WHERE ")?;
    Some(sql[position + " WHERE ".len()..].trim().to_string())
}

fn postgres_action(code: &str) -> ForeignKeyAction {
    match code {
        "r" => ForeignKeyAction::Restrict,
        "c" => ForeignKeyAction::Cascade,
        "n" => ForeignKeyAction::SetNull,
        "d" => ForeignKeyAction::SetDefault,
        _ => ForeignKeyAction::NoAction,
    }
}

fn split_list(list: Option<String>) -> Vec<String> {
    list.map(|l| l.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

async fn postgres_table(db: &Database, name: &str) -> Result<TableSchema> {
    let pool = db.pool();
    let (namespace, short_name) = split_qualified(name);
    let mut table = TableSchema::new(name);

    #[allow(clippy::type_complexity)]
    let rows: Vec<(
        String,
        String,
        String,
        Option<String>,
        Option<i32>,
        Option<i32>,
        Option<i32>,
        Option<String>,
    )> = catalog(
        sqlx::query_as(
            "SELECT c.column_name::text, c.data_type::text, c.is_nullable::text, \
             c.column_default::text, c.character_maximum_length::int4, \
             c.numeric_precision::int4, c.numeric_scale::int4, \
             col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, \
             c.ordinal_position::int4)::text \
             FROM information_schema.columns c \
             WHERE c.table_schema = $1 AND c.table_name = $2 \
             ORDER BY c.ordinal_position",
        )
        .bind(namespace)
        .bind(short_name)
        .fetch_all(pool)
        .await,
    )?;

    for (column_name, data_type, is_nullable, default, length, precision, scale, comment) in rows {
        let mut spec = parse_declared_type(&data_type);
        match spec.column_type {
            ColumnType::String | ColumnType::Binary => {
                spec.length = length.and_then(|l| u32::try_from(l).ok());
            }
            ColumnType::Decimal => {
                spec.precision = precision.and_then(|p| u8::try_from(p).ok());
                spec.scale = scale.and_then(|s| u8::try_from(s).ok());
            }
            _ => {}
        }
        let mut column = spec.into_column(column_name);
        column.nullable = is_nullable == "YES";
        match default.as_deref() {
            Some(expr) if expr.starts_with("nextval(") => column.auto_increment = true,
            Some(expr) => column.default = DefaultValue::from_catalog(expr),
            None => {}
        }
        column.comment = comment;
        table.columns.push(column);
    }

    let key: Vec<(String, String)> = catalog(
        sqlx::query_as(
            "SELECT tc.constraint_name::text, kcu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_name = tc.constraint_name \
              AND kcu.table_schema = tc.table_schema \
              AND kcu.table_name = tc.table_name \
             WHERE tc.constraint_type = 'PRIMARY KEY' \
               AND tc.table_schema = $1 AND tc.table_name = $2 \
             ORDER BY kcu.ordinal_position",
        )
        .bind(namespace)
        .bind(short_name)
        .fetch_all(pool)
        .await,
    )?;
    if let Some((constraint, _)) = key.first() {
        table.primary_key = Some(PrimaryKey {
            name: Some(constraint.clone()),
            columns: key.iter().map(|(_, column)| column.clone()).collect(),
        });
    }

    let indexes: Vec<(String, bool, Option<String>, Option<String>)> = catalog(
        sqlx::query_as(
            "SELECT ic.relname::text, ix.indisunique, \
             string_agg(a.attname::text, ',' ORDER BY array_position(ix.indkey::int2[], a.attnum))::text, \
             pg_get_expr(ix.indpred, ix.indrelid)::text \
             FROM pg_index ix \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_class ic ON ic.oid = ix.indexrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey::int2[]) \
             WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary \
             GROUP BY ic.relname, ix.indisunique, ix.indpred, ix.indrelid \
             ORDER BY ic.relname",
        )
        .bind(namespace)
        .bind(short_name)
        .fetch_all(pool)
        .await,
    )?;
    for (index_name, unique, columns, predicate) in indexes {
        let mut index = IndexSchema::new(index_name, split_list(columns));
        index.unique = unique;
        if let Some(predicate) = predicate {
            let condition = predicate
                .strip_prefix('(')
                .and_then(|p| p.strip_suffix(')'))
                .unwrap_or(&predicate)
                .to_string();
            index.options.insert("where".to_string(), condition);
        }
        table.indexes.push(index);
    }

    #[allow(clippy::type_complexity)]
    let foreign_keys: Vec<(String, Option<String>, String, String, Option<String>, String, String)> =
        catalog(
            sqlx::query_as(
                "SELECT con.conname::text, \
                 (SELECT string_agg(a.attname::text, ',' ORDER BY k.ord) \
                    FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) \
                    JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum)::text, \
                 ft.relname::text, fn.nspname::text, \
                 (SELECT string_agg(a.attname::text, ',' ORDER BY k.ord) \
                    FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord) \
                    JOIN pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum)::text, \
                 con.confdeltype::text, con.confupdtype::text \
                 FROM pg_constraint con \
                 JOIN pg_class t ON t.oid = con.conrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_class ft ON ft.oid = con.confrelid \
                 JOIN pg_namespace fn ON fn.oid = ft.relnamespace \
                 WHERE con.contype = 'f' AND n.nspname = $1 AND t.relname = $2 \
                 ORDER BY con.conname",
            )
            .bind(namespace)
            .bind(short_name)
            .fetch_all(pool)
            .await,
        )?;
    for (fk_name, columns, foreign_table, foreign_namespace, foreign_columns, on_delete, on_update) in
        foreign_keys
    {
        table.foreign_keys.push(ForeignKeySchema {
            name: fk_name,
            columns: split_list(columns),
            references_table: qualify(&foreign_namespace, &foreign_table),
            references_columns: split_list(foreign_columns),
            on_delete: postgres_action(&on_delete),
            on_update: postgres_action(&on_update),
        });
    }

    Ok(table)
}

fn mysql_default(raw: &str, extra: &str, column_type: ColumnType) -> DefaultValue {
    let trimmed = raw.trim();
    if trimmed.to_ascii_lowercase().starts_with("current_timestamp") {
        return DefaultValue::Expression("CURRENT_TIMESTAMP".to_string());
    }
    if extra.to_ascii_uppercase().contains("DEFAULT_GENERATED") {
        return DefaultValue::Expression(trimmed.to_string());
    }
    let numeric = column_type.is_integer()
        || matches!(
            column_type,
            ColumnType::Boolean | ColumnType::Decimal | ColumnType::Float
        );
    // MySQL reports string defaults without quotes, MariaDB with them.
    if numeric || trimmed.starts_with('\'') || trimmed.eq_ignore_ascii_case("null") {
        DefaultValue::from_catalog(trimmed)
    } else {
        DefaultValue::String(trimmed.to_string())
    }
}

async fn mysql_table(db: &Database, name: &str) -> Result<TableSchema> {
    let pool = db.pool();
    let mut table = TableSchema::new(name);

    let rows: Vec<(String, String, String, Option<String>, String, String)> = catalog(
        sqlx::query_as(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), \
             CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), \
             CAST(EXTRA AS CHAR), CAST(COLUMN_COMMENT AS CHAR) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;
    for (column_name, column_type, is_nullable, default, extra, comment) in rows {
        let mut column = parse_declared_type(&column_type).into_column(column_name);
        column.nullable = is_nullable == "YES";
        column.auto_increment = extra.to_ascii_lowercase().contains("auto_increment");
        let column_type = column.column_type;
        column.default = default
            .as_deref()
            .map_or(DefaultValue::None, |raw| mysql_default(raw, &extra, column_type));
        column.comment = (!comment.is_empty()).then_some(comment);
        table.columns.push(column);
    }

    let foreign_keys: Vec<(String, String, String, String, String, String)> = catalog(
        sqlx::query_as(
            "SELECT CAST(k.CONSTRAINT_NAME AS CHAR), CAST(k.COLUMN_NAME AS CHAR), \
             CAST(k.REFERENCED_TABLE_NAME AS CHAR), CAST(k.REFERENCED_COLUMN_NAME AS CHAR), \
             CAST(r.UPDATE_RULE AS CHAR), CAST(r.DELETE_RULE AS CHAR) \
             FROM information_schema.KEY_COLUMN_USAGE k \
             JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
               ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
              AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             WHERE k.TABLE_SCHEMA = DATABASE() AND k.TABLE_NAME = ? \
             ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;
    for (fk_name, column, foreign_table, foreign_column, on_update, on_delete) in foreign_keys {
        match table.foreign_keys.last_mut() {
            Some(fk) if fk.name == fk_name => {
                fk.columns.push(column);
                fk.references_columns.push(foreign_column);
            }
            _ => table.foreign_keys.push(ForeignKeySchema {
                name: fk_name,
                columns: vec![column],
                references_table: foreign_table,
                references_columns: vec![foreign_column],
                on_delete: ForeignKeyAction::parse(&on_delete).unwrap_or_default(),
                on_update: ForeignKeyAction::parse(&on_update).unwrap_or_default(),
            }),
        }
    }

    let index_rows: Vec<(String, i64, Option<String>)> = catalog(
        sqlx::query_as(
            "SELECT CAST(INDEX_NAME AS CHAR), CAST(NON_UNIQUE AS SIGNED), CAST(COLUMN_NAME AS CHAR) \
             FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
        )
        .bind(name)
        .fetch_all(pool)
        .await,
    )?;
    let mut grouped: BTreeMap<String, (bool, Vec<String>)> = BTreeMap::new();
    for (index_name, non_unique, column) in index_rows {
        let entry = grouped
            .entry(index_name)
            .or_insert_with(|| (non_unique == 0, Vec::new()));
        entry.1.extend(column);
    }
    for (index_name, (unique, columns)) in grouped {
        if index_name == "PRIMARY" {
            table.primary_key = Some(PrimaryKey {
                name: None,
                columns,
            });
            continue;
        }
        // Foreign keys get a backing index named after the constraint.
        if table.foreign_keys.iter().any(|fk| fk.name == index_name) {
            continue;
        }
        let mut index = IndexSchema::new(index_name, columns);
        index.unique = unique;
        table.indexes.push(index);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_types() {
        let spec = parse_declared_type("VARCHAR(255)");
        assert_eq!(spec.column_type, ColumnType::String);
        assert_eq!(spec.length, Some(255));

        let spec = parse_declared_type("NUMERIC(18, 8)");
        assert_eq!(spec.column_type, ColumnType::Decimal);
        assert_eq!((spec.precision, spec.scale), (Some(18), Some(8)));

        let spec = parse_declared_type("int(10) unsigned");
        assert_eq!(spec.column_type, ColumnType::Integer);
        assert!(spec.unsigned);

        assert_eq!(parse_declared_type("tinyint(1)").column_type, ColumnType::Boolean);
        assert!(parse_declared_type("CHAR(36)").fixed);
        assert_eq!(
            parse_declared_type("timestamp with time zone").column_type,
            ColumnType::DateTimeTz
        );
        assert_eq!(parse_declared_type("").column_type, ColumnType::Text);
    }

    #[test]
    fn test_where_clause() {
        assert_eq!(
            where_clause("CREATE INDEX \"i\" ON \"t\" (\"a\") WHERE a > 0").as_deref(),
            Some("a > 0")
        );
        assert_eq!(where_clause("CREATE INDEX \"i\" ON \"t\" (\"a\")"), None);
    }

    #[test]
    fn test_mysql_defaults() {
        assert_eq!(
            mysql_default("current_timestamp()", "", ColumnType::DateTime),
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(
            mysql_default("active", "", ColumnType::String),
            DefaultValue::String("active".to_string())
        );
        assert_eq!(mysql_default("0", "", ColumnType::Boolean), DefaultValue::Integer(0));
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(qualify("public", "users"), "users");
        assert_eq!(qualify("market", "tickers"), "market.tickers");
        assert_eq!(split_qualified("market.tickers"), ("market", "tickers"));
        assert_eq!(split_qualified("users"), ("public", "users"));
    }
}
