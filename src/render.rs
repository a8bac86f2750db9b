//! Response representations: JSON shapes, link derivation, and the minimal
//! HTML views that back content negotiation.

use crate::registry::{ResourceDescriptor, ResourceRegistry};
use crate::service::Page;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Render a JSON scalar the way it appears in a URI path segment.
pub fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The row's primary-key value as a path segment.
pub fn key_string(descriptor: &ResourceDescriptor, row: &Map<String, Value>) -> String {
    row.get(&descriptor.primary_key)
        .map(scalar_string)
        .unwrap_or_default()
}

/// Link relations for one resource instance: `self` plus one
/// `related(<table>)` entry per set foreign key.
pub fn links_for(
    descriptor: &ResourceDescriptor,
    registry: &ResourceRegistry,
    row: &Map<String, Value>,
) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for fk in &descriptor.foreign_keys {
        let Some(value) = row.get(&fk.column) else { continue };
        if value.is_null() {
            continue;
        }
        if let Some(related) = registry.get(&fk.referenced_table) {
            links.push((
                format!("related({})", fk.referenced_table),
                related.resource_uri(&scalar_string(value)),
            ));
        }
    }
    links.push((
        "self".to_string(),
        descriptor.resource_uri(&key_string(descriptor, row)),
    ));
    links
}

/// Serialize links into a Link header value.
pub fn link_header(links: &[(String, String)]) -> String {
    links
        .iter()
        .map(|(rel, uri)| format!("<{}>; rel=\"{}\"", uri, rel))
        .collect::<Vec<_>>()
        .join(", ")
}

/// JSON representation of one row: every column, a `self` URI, and for each
/// set foreign key either a `<related>_url` link or (when expanded) the
/// nested related object.
pub fn resource_json(
    descriptor: &ResourceDescriptor,
    registry: &ResourceRegistry,
    row: &Map<String, Value>,
    expanded: &HashMap<String, Value>,
) -> Value {
    let mut out = row.clone();
    for fk in &descriptor.foreign_keys {
        let Some(value) = row.get(&fk.column) else { continue };
        if value.is_null() {
            continue;
        }
        let Some(related) = registry.get(&fk.referenced_table) else { continue };
        let related_key = related.resource_name.to_lowercase();
        if let Some(nested) = expanded.get(&fk.column) {
            out.insert(related_key, nested.clone());
        } else {
            out.insert(
                format!("{}_url", related_key),
                Value::String(related.resource_uri(&scalar_string(value))),
            );
        }
    }
    out.insert(
        "self".to_string(),
        Value::String(descriptor.resource_uri(&key_string(descriptor, row))),
    );
    Value::Object(out)
}

/// Collection envelope: the page of resources plus pagination counters.
pub fn collection_json(resources: Vec<Value>, page: &Page) -> Value {
    json!({
        "resources": resources,
        "pagination": {
            "page": page.page,
            "per_page": page.per_page,
            "count": page.total,
        }
    })
}

pub fn attribute_json(name: &str, value: &Value) -> Value {
    let mut map = Map::new();
    map.insert(name.to_string(), value.clone());
    Value::Object(map)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><title>{}</title></head><body>{}</body></html>",
        escape(title),
        body
    )
}

/// One resource as a two-column name/value table.
pub fn resource_html(descriptor: &ResourceDescriptor, row: &Map<String, Value>) -> String {
    let mut rows = String::new();
    for c in &descriptor.columns {
        let value = row.get(&c.name).unwrap_or(&Value::Null);
        rows.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            escape(&c.name),
            cell(value)
        ));
    }
    html_page(
        &descriptor.resource_name,
        &format!(
            "<h1>{}</h1><table>{}</table>",
            escape(&descriptor.resource_name),
            rows
        ),
    )
}

/// A collection page as a table, one row per resource.
pub fn collection_html(descriptor: &ResourceDescriptor, rows: &[Value]) -> String {
    let header: String = descriptor
        .columns
        .iter()
        .map(|c| format!("<th>{}</th>", escape(&c.name)))
        .collect();
    let mut body = String::new();
    for row in rows {
        let Some(obj) = row.as_object() else { continue };
        let cells: String = descriptor
            .columns
            .iter()
            .map(|c| format!("<td>{}</td>", cell(obj.get(&c.name).unwrap_or(&Value::Null))))
            .collect();
        body.push_str(&format!("<tr>{}</tr>", cells));
    }
    html_page(
        &descriptor.endpoint,
        &format!(
            "<h1>{}</h1><table><tr>{}</tr>{}</table>",
            escape(&descriptor.endpoint),
            header,
            body
        ),
    )
}

pub fn attribute_html(name: &str, value: &Value) -> String {
    html_page(
        name,
        &format!("<p><b>{}</b>: {}</p>", escape(name), cell(value)),
    )
}

pub fn error_html(status: u16, message: &str) -> String {
    html_page(
        &format!("{}", status),
        &format!("<h1>{}</h1><p>{}</p>", status, escape(message)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{ColumnSchema, ColumnType, ForeignKey, TableSchema};
    use crate::registry::RegistryBuilder;

    fn registry() -> ResourceRegistry {
        let artist = TableSchema {
            name: "Artist".into(),
            columns: vec![
                ColumnSchema {
                    name: "ArtistId".into(),
                    ty: ColumnType::Integer,
                    nullable: false,
                    has_default: true,
                    ordinal: 1,
                },
                ColumnSchema {
                    name: "Name".into(),
                    ty: ColumnType::Text,
                    nullable: true,
                    has_default: false,
                    ordinal: 2,
                },
            ],
            primary_key: vec!["ArtistId".into()],
            foreign_keys: vec![],
        };
        let album = TableSchema {
            name: "Album".into(),
            columns: vec![
                ColumnSchema {
                    name: "AlbumId".into(),
                    ty: ColumnType::Integer,
                    nullable: false,
                    has_default: true,
                    ordinal: 1,
                },
                ColumnSchema {
                    name: "ArtistId".into(),
                    ty: ColumnType::Integer,
                    nullable: false,
                    has_default: false,
                    ordinal: 2,
                },
            ],
            primary_key: vec!["AlbumId".into()],
            foreign_keys: vec![ForeignKey {
                column: "ArtistId".into(),
                referenced_table: "Artist".into(),
                referenced_column: "ArtistId".into(),
            }],
        };
        RegistryBuilder::from_tables(&[artist, album], &Default::default())
            .unwrap()
            .build()
    }

    #[test]
    fn resource_json_carries_self_and_fk_link() {
        let registry = registry();
        let album = registry.lookup("albums").unwrap();
        let row: Map<String, Value> = serde_json::from_str(
            r#"{"AlbumId": 5, "ArtistId": 276}"#,
        )
        .unwrap();
        let out = resource_json(album, &registry, &row, &HashMap::new());
        assert_eq!(out["self"], "/albums/5");
        assert_eq!(out["artist_url"], "/artists/276");
        assert_eq!(out["AlbumId"], 5);
    }

    #[test]
    fn expanded_fk_nests_the_related_object() {
        let registry = registry();
        let album = registry.lookup("albums").unwrap();
        let row: Map<String, Value> = serde_json::from_str(
            r#"{"AlbumId": 5, "ArtistId": 276}"#,
        )
        .unwrap();
        let mut expanded = HashMap::new();
        expanded.insert(
            "ArtistId".to_string(),
            json!({"ArtistId": 276, "Name": "Jeff Knupp"}),
        );
        let out = resource_json(album, &registry, &row, &expanded);
        assert_eq!(out["artist"]["Name"], "Jeff Knupp");
        assert!(out.get("artist_url").is_none());
    }

    #[test]
    fn collection_envelope_reports_pagination() {
        let page = Page {
            rows: vec![],
            page: 2,
            per_page: 20,
            total: 275,
        };
        let out = collection_json(vec![json!({"a": 1})], &page);
        assert_eq!(out["pagination"]["page"], 2);
        assert_eq!(out["pagination"]["count"], 275);
        assert_eq!(out["resources"][0]["a"], 1);
    }

    #[test]
    fn link_header_format() {
        let links = vec![
            ("related(Artist)".to_string(), "/artists/276".to_string()),
            ("self".to_string(), "/albums/5".to_string()),
        ];
        assert_eq!(
            link_header(&links),
            "</artists/276>; rel=\"related(Artist)\", </albums/5>; rel=\"self\""
        );
    }

    #[test]
    fn html_views_escape_values() {
        let registry = registry();
        let artist = registry.lookup("artists").unwrap();
        let row: Map<String, Value> =
            serde_json::from_str(r#"{"ArtistId": 1, "Name": "AC/DC <script>"}"#).unwrap();
        let html = resource_html(artist, &row);
        assert!(html.contains("AC/DC &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
