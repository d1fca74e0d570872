//! Dimension definitions.

use serde::Serialize;

/// Placeholder standing for the dimension's table inside a temporal template.
pub const TABLE_PLACEHOLDER: &str = "{TABLE}";

/// How a dimension produces its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DimensionKind {
    /// A plain column.
    Categorical { column: String },
    /// A SQL-fragment template over one column, e.g.
    /// `strftime('%Y-%m', {TABLE}.created_at)`.
    Temporal { sql: String },
}

/// A named grouping attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub table: String,
    #[serde(flatten)]
    pub kind: DimensionKind,
    /// Column joining `table` to a metric's base table. When unset, the first
    /// column name the two tables share is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_key: Option<String>,
}

impl DimensionDefinition {
    pub fn categorical(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            table: table.into(),
            kind: DimensionKind::Categorical {
                column: column.into(),
            },
            join_key: None,
        }
    }

    pub fn temporal(
        name: impl Into<String>,
        table: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            table: table.into(),
            kind: DimensionKind::Temporal { sql: sql.into() },
            join_key: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_join_key(mut self, join_key: impl Into<String>) -> Self {
        self.join_key = Some(join_key.into());
        self
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self.kind, DimensionKind::Temporal { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            DimensionKind::Categorical { .. } => "categorical",
            DimensionKind::Temporal { .. } => "temporal",
        }
    }
}
