//! Relationship linker: turns foreign-key edges into symmetric relations
//! between descriptors.

use crate::registry::descriptor::ResourceDescriptor;
use std::collections::HashMap;

/// Attach `related` endpoints to every descriptor: for each edge
/// T1.col -> T2, both T1 and T2 record the other side. A table referencing
/// itself is recorded once. Relations are keyed by endpoint name, so running
/// the linker again over the same descriptors changes nothing.
pub fn link(descriptors: &mut [ResourceDescriptor]) {
    let endpoint_by_table: HashMap<String, String> = descriptors
        .iter()
        .map(|d| (d.table_name.clone(), d.endpoint.clone()))
        .collect();

    let mut pairs: Vec<(String, String)> = Vec::new();
    for d in descriptors.iter() {
        for fk in &d.foreign_keys {
            // Edges into tables that were not registered (skipped or
            // filtered) are left unlinked.
            if let Some(referenced) = endpoint_by_table.get(&fk.referenced_table) {
                pairs.push((d.endpoint.clone(), referenced.clone()));
            }
        }
    }

    for d in descriptors.iter_mut() {
        for (ours, theirs) in &pairs {
            if d.endpoint == *ours {
                d.related.insert(theirs.clone());
            }
            if d.endpoint == *theirs {
                d.related.insert(ours.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{ColumnSchema, ColumnType, ForeignKey, TableSchema};

    fn table(name: &str, fks: Vec<ForeignKey>) -> TableSchema {
        TableSchema {
            name: name.into(),
            columns: vec![ColumnSchema {
                name: "id".into(),
                ty: ColumnType::Integer,
                nullable: false,
                has_default: true,
                ordinal: 1,
            }],
            primary_key: vec!["id".into()],
            foreign_keys: fks,
        }
    }

    fn fk(column: &str, to_table: &str) -> ForeignKey {
        ForeignKey {
            column: column.into(),
            referenced_table: to_table.into(),
            referenced_column: "id".into(),
        }
    }

    #[test]
    fn relations_are_symmetric() {
        let mut descriptors = vec![
            ResourceDescriptor::from_table(&table("album", vec![fk("artist_id", "artist")]), None),
            ResourceDescriptor::from_table(&table("artist", vec![]), None),
        ];
        link(&mut descriptors);
        assert!(descriptors[0].related.contains("artists"));
        assert!(descriptors[1].related.contains("albums"));
    }

    #[test]
    fn linking_twice_is_a_no_op() {
        let mut descriptors = vec![
            ResourceDescriptor::from_table(&table("album", vec![fk("artist_id", "artist")]), None),
            ResourceDescriptor::from_table(&table("artist", vec![]), None),
        ];
        link(&mut descriptors);
        let first: Vec<_> = descriptors.iter().map(|d| d.related.clone()).collect();
        link(&mut descriptors);
        let second: Vec<_> = descriptors.iter().map(|d| d.related.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn self_reference_is_recorded_once() {
        let mut descriptors = vec![ResourceDescriptor::from_table(
            &table("employee", vec![fk("reports_to", "employee")]),
            None,
        )];
        link(&mut descriptors);
        assert_eq!(descriptors[0].related.len(), 1);
        assert!(descriptors[0].related.contains("employees"));
    }

    #[test]
    fn edges_to_unregistered_tables_are_ignored() {
        let mut descriptors = vec![ResourceDescriptor::from_table(
            &table("album", vec![fk("artist_id", "artist")]),
            None,
        )];
        link(&mut descriptors);
        assert!(descriptors[0].related.is_empty());
    }
}
