//! Ordered, name-unique column schemas with merge semantics
//!
//! Schemas are built incrementally by each pipeline stage appending its
//! columns to the previous stage's schema, and merged across sibling
//! pipelines into the final union schema. Column order is append order and
//! becomes the final row field order. Every operation returns a new schema.

mod column;

use std::collections::HashMap;

use serde_json::Value;

pub use column::{Column, ColumnTransform, DataType};

use crate::error::AbiError;

/// One output row keyed by column name
pub type Row = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Schema {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.clone(), i))
            .collect();
        Schema { columns, index }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|i| &self.columns[*i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append columns to this schema. Strict mode (`allow_dupes = false`)
    /// rejects any name collision; lenient mode rejects only a same-name
    /// column of a different type and otherwise keeps the first definition,
    /// never duplicating the column.
    pub fn with_columns(&self, columns: Vec<Column>, allow_dupes: bool) -> Result<Schema, AbiError> {
        let mut new_columns = self.columns.clone();
        let mut index = self.index.clone();

        for column in columns {
            if let Some(existing) = index.get(&column.name).map(|i| &new_columns[*i]) {
                if !allow_dupes {
                    return Err(AbiError::DuplicateColumn(column.name));
                }
                if existing.data_type != column.data_type {
                    return Err(AbiError::ColumnTypeConflict {
                        name: column.name,
                        existing: existing.data_type.to_string(),
                        incoming: column.data_type.to_string(),
                    });
                }
                // same name, same type: first definition wins
                continue;
            }

            index.insert(column.name.clone(), new_columns.len());
            new_columns.push(column);
        }

        Ok(Schema {
            columns: new_columns,
            index,
        })
    }

    /// Append another schema's columns after renaming each one, preserving
    /// their order. Used to prefix a matched item's columns.
    pub fn merge_schema(
        &self,
        other: &Schema,
        rename: impl Fn(&str) -> String,
        allow_dupes: bool,
    ) -> Result<Schema, AbiError> {
        let renamed = other
            .columns
            .iter()
            .map(|column| column.renamed(rename(&column.name)))
            .collect();
        self.with_columns(renamed, allow_dupes)
    }
}
