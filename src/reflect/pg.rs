//! PostgreSQL introspection over information_schema.

use crate::error::ReflectError;
use crate::reflect::types::{ColumnSchema, ColumnType, ForeignKey, PkPolicy, TableSchema};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Reflect the `public` schema of the connected database.
pub async fn reflect_schema(
    pool: &PgPool,
    policy: PkPolicy,
) -> Result<Vec<TableSchema>, ReflectError> {
    reflect_schema_in(pool, "public", policy).await
}

/// Reflect one database schema into table metadata. Output order is
/// deterministic (table name, then column ordinal), so reflecting an
/// unchanged schema twice yields identical results.
pub async fn reflect_schema_in(
    pool: &PgPool,
    schema: &str,
    policy: PkPolicy,
) -> Result<Vec<TableSchema>, ReflectError> {
    let table_names: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    let columns: Vec<(String, String, String, String, Option<String>, i32)> = sqlx::query_as(
        "SELECT table_name::text, column_name::text, data_type::text, is_nullable::text, \
                column_default::text, ordinal_position::int4 \
         FROM information_schema.columns \
         WHERE table_schema = $1 \
         ORDER BY table_name, ordinal_position",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    let pk_columns: Vec<(String, String)> = sqlx::query_as(
        "SELECT tc.table_name::text, kcu.column_name::text \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY' \
         ORDER BY tc.table_name, kcu.ordinal_position",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    let fk_edges: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT tc.table_name::text, kcu.column_name::text, \
                ccu.table_name::text AS referenced_table, ccu.column_name::text AS referenced_column \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON tc.constraint_name = ccu.constraint_name \
          AND tc.table_schema = ccu.table_schema \
         WHERE tc.table_schema = $1 AND tc.constraint_type = 'FOREIGN KEY' \
         ORDER BY tc.table_name, kcu.column_name",
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    let mut tables = assemble_tables(&table_names, &columns, &pk_columns, &fk_edges);

    let mut kept = Vec::with_capacity(tables.len());
    for table in tables.drain(..) {
        if !table.primary_key.is_empty() {
            kept.push(table);
            continue;
        }
        match policy {
            PkPolicy::Reject => {
                return Err(ReflectError::MissingPrimaryKey(table.name));
            }
            PkPolicy::Skip => {
                tracing::warn!(table = %table.name, "table has no primary key, skipping");
            }
            PkPolicy::Synthesize => {
                kept.push(synthesize_primary_key(pool, schema, table).await?);
            }
        }
    }
    Ok(kept)
}

/// Pure assembly of raw catalog rows into table metadata.
fn assemble_tables(
    table_names: &[(String,)],
    columns: &[(String, String, String, String, Option<String>, i32)],
    pk_columns: &[(String, String)],
    fk_edges: &[(String, String, String, String)],
) -> Vec<TableSchema> {
    let mut by_name: BTreeMap<&str, TableSchema> = table_names
        .iter()
        .map(|(name,)| {
            (
                name.as_str(),
                TableSchema {
                    name: name.clone(),
                    columns: Vec::new(),
                    primary_key: Vec::new(),
                    foreign_keys: Vec::new(),
                },
            )
        })
        .collect();

    for (table, column, data_type, is_nullable, default, ordinal) in columns {
        if let Some(t) = by_name.get_mut(table.as_str()) {
            t.columns.push(ColumnSchema {
                name: column.clone(),
                ty: ColumnType::from_data_type(data_type),
                nullable: is_nullable == "YES",
                has_default: default.is_some(),
                ordinal: *ordinal,
            });
        }
    }

    for (table, column) in pk_columns {
        if let Some(t) = by_name.get_mut(table.as_str()) {
            t.primary_key.push(column.clone());
        }
    }

    for (table, column, referenced_table, referenced_column) in fk_edges {
        if let Some(t) = by_name.get_mut(table.as_str()) {
            t.foreign_keys.push(ForeignKey {
                column: column.clone(),
                referenced_table: referenced_table.clone(),
                referenced_column: referenced_column.clone(),
            });
        }
    }

    by_name.into_values().collect()
}

/// Add a primary key spanning every column of *table*. This physically
/// alters the schema and is only reachable under PkPolicy::Synthesize.
async fn synthesize_primary_key(
    pool: &PgPool,
    schema: &str,
    mut table: TableSchema,
) -> Result<TableSchema, ReflectError> {
    let key_columns: Vec<String> = table.columns.iter().map(|c| quoted(&c.name)).collect();
    tracing::warn!(
        table = %table.name,
        columns = %key_columns.join(", "),
        "synthesizing primary key: altering physical schema"
    );
    let ddl = format!(
        "ALTER TABLE {}.{} ADD PRIMARY KEY ({})",
        quoted(schema),
        quoted(&table.name),
        key_columns.join(", ")
    );
    sqlx::query(&ddl).execute(pool).await?;
    table.primary_key = table.columns.iter().map(|c| c.name.clone()).collect();
    Ok(table)
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_fixture() -> (
        Vec<(String,)>,
        Vec<(String, String, String, String, Option<String>, i32)>,
        Vec<(String, String)>,
        Vec<(String, String, String, String)>,
    ) {
        let tables = vec![("Album".to_string(),), ("Artist".to_string(),)];
        let columns = vec![
            (
                "Album".into(),
                "AlbumId".into(),
                "integer".into(),
                "NO".into(),
                Some("nextval('album_seq')".into()),
                1,
            ),
            (
                "Album".into(),
                "Title".into(),
                "character varying".into(),
                "NO".into(),
                None,
                2,
            ),
            (
                "Album".into(),
                "ArtistId".into(),
                "integer".into(),
                "NO".into(),
                None,
                3,
            ),
            (
                "Artist".into(),
                "ArtistId".into(),
                "integer".into(),
                "NO".into(),
                Some("nextval('artist_seq')".into()),
                1,
            ),
            (
                "Artist".into(),
                "Name".into(),
                "character varying".into(),
                "YES".into(),
                None,
                2,
            ),
        ];
        let pks = vec![
            ("Album".to_string(), "AlbumId".to_string()),
            ("Artist".to_string(), "ArtistId".to_string()),
        ];
        let fks = vec![(
            "Album".to_string(),
            "ArtistId".to_string(),
            "Artist".to_string(),
            "ArtistId".to_string(),
        )];
        (tables, columns, pks, fks)
    }

    #[test]
    fn assembles_tables_with_keys_and_edges() {
        let (tables, columns, pks, fks) = raw_fixture();
        let out = assemble_tables(&tables, &columns, &pks, &fks);
        assert_eq!(out.len(), 2);

        let album = &out[0];
        assert_eq!(album.name, "Album");
        assert_eq!(album.primary_key, vec!["AlbumId"]);
        assert_eq!(album.columns.len(), 3);
        assert!(album.columns[0].has_default);
        assert_eq!(album.foreign_keys.len(), 1);
        assert_eq!(album.foreign_keys[0].referenced_table, "Artist");

        let artist = &out[1];
        assert_eq!(artist.primary_key, vec!["ArtistId"]);
        assert!(artist.columns[1].nullable);
        assert!(artist.foreign_keys.is_empty());
    }

    #[test]
    fn assembly_is_deterministic() {
        let (tables, columns, pks, fks) = raw_fixture();
        let a = assemble_tables(&tables, &columns, &pks, &fks);
        let b = assemble_tables(&tables, &columns, &pks, &fks);
        assert_eq!(a, b);
    }
}
