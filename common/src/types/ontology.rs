use serde::{Deserialize, Serialize};

/// One table in the destination ontology.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DestinationTable {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Snapshot of the destination data schema that extracted entities are
/// mapped onto. Read-only for the lifetime of a pipeline run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DestinationSchema {
    pub id: String,
    pub tables: Vec<DestinationTable>,
}

impl DestinationSchema {
    pub fn table(&self, name: &str) -> Option<&DestinationTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}
