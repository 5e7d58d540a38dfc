use serde::{Deserialize, Serialize};

/// Correspondence between one source field and one destination column.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FieldMatch {
    pub source_field: String,
    pub column: String,
    pub confidence: f64,
}

/// The destination table chosen for a source entity, with the confidence
/// that drove the choice and the per-field correspondences scoped to that
/// table's columns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableMatch {
    pub table: String,
    pub confidence: f64,
    #[serde(default)]
    pub fields: Vec<FieldMatch>,
}

/// Mapping outcome for one source entity. `target: None` means the entity
/// stayed unmapped because nothing scored above the confidence threshold.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntityMapping {
    pub entity: String,
    pub target: Option<TableMatch>,
}

/// Confidence-scored correspondences from an `ApiSpec` onto a destination
/// schema snapshot. Derived once per run; never an error on well-formed
/// input: unmatched entities are carried as unmapped entries.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct OntologyMapping {
    pub schema_id: String,
    pub entries: Vec<EntityMapping>,
}

impl OntologyMapping {
    /// Entries that resolved to a destination table.
    pub fn mapped(&self) -> impl Iterator<Item = (&str, &TableMatch)> {
        self.entries
            .iter()
            .filter_map(|e| e.target.as_ref().map(|t| (e.entity.as_str(), t)))
    }

    pub fn mapped_count(&self) -> usize {
        self.mapped().count()
    }

    pub fn target_for(&self, entity: &str) -> Option<&TableMatch> {
        self.entries
            .iter()
            .find(|e| e.entity == entity)
            .and_then(|e| e.target.as_ref())
    }
}
