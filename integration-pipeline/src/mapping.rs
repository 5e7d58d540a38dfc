use std::collections::BTreeSet;

use common::types::{
    api_spec::{ApiSpec, Entity},
    ontology::{DestinationSchema, DestinationTable},
    ontology_mapping::{EntityMapping, FieldMatch, OntologyMapping, TableMatch},
};
use strsim::jaro_winkler;
use tracing::debug;

/// Matches extracted entities and fields onto destination tables and
/// columns by name similarity. Pure and deterministic: identical inputs
/// always produce identical mappings, and it never fails — entities with
/// no confident match are returned unmapped.
pub struct OntologyMapper {
    confidence_threshold: f64,
}

impl OntologyMapper {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    #[tracing::instrument(skip_all, fields(entities = spec.entities.len(), schema_id = %schema.id))]
    pub fn map(&self, spec: &ApiSpec, schema: &DestinationSchema) -> OntologyMapping {
        let entries = spec
            .entities
            .iter()
            .map(|entity| EntityMapping {
                entity: entity.name.clone(),
                target: self.best_table(entity, schema),
            })
            .collect::<Vec<_>>();

        let mapped = entries.iter().filter(|e| e.target.is_some()).count();
        debug!(
            mapped,
            unmapped = entries.len().saturating_sub(mapped),
            "ontology mapping computed"
        );

        OntologyMapping {
            schema_id: schema.id.clone(),
            entries,
        }
    }

    /// Best destination table for an entity, or `None` when nothing scores
    /// at or above the threshold. Ties break on more matched fields, then
    /// on the lexicographically smallest table name.
    fn best_table(&self, entity: &Entity, schema: &DestinationSchema) -> Option<TableMatch> {
        let mut best: Option<(f64, Vec<FieldMatch>, &DestinationTable)> = None;

        for table in &schema.tables {
            let score = name_similarity(&entity.name, &table.name);
            let fields = self.map_fields(entity, table);

            let better = match &best {
                None => true,
                Some((best_score, best_fields, best_table)) => {
                    match score.total_cmp(best_score) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => match fields.len().cmp(&best_fields.len()) {
                            std::cmp::Ordering::Greater => true,
                            std::cmp::Ordering::Less => false,
                            std::cmp::Ordering::Equal => table.name < best_table.name,
                        },
                    }
                }
            };

            if better {
                best = Some((score, fields, table));
            }
        }

        best.and_then(|(score, fields, table)| {
            if score < self.confidence_threshold {
                return None;
            }
            Some(TableMatch {
                table: table.name.clone(),
                confidence: score,
                fields,
            })
        })
    }

    /// Field correspondences scoped to one candidate table's columns,
    /// using the same scoring rule and threshold as entity matching.
    fn map_fields(&self, entity: &Entity, table: &DestinationTable) -> Vec<FieldMatch> {
        entity
            .fields
            .iter()
            .filter_map(|field| {
                let mut best: Option<(f64, &String)> = None;
                for column in &table.columns {
                    let score = name_similarity(&field.name, column);
                    let better = match &best {
                        None => true,
                        Some((best_score, best_column)) => match score.total_cmp(best_score) {
                            std::cmp::Ordering::Greater => true,
                            std::cmp::Ordering::Less => false,
                            std::cmp::Ordering::Equal => column < *best_column,
                        },
                    };
                    if better {
                        best = Some((score, column));
                    }
                }

                best.and_then(|(score, column)| {
                    if score < self.confidence_threshold {
                        return None;
                    }
                    Some(FieldMatch {
                        source_field: field.name.clone(),
                        column: column.clone(),
                        confidence: score,
                    })
                })
            })
            .collect()
    }
}

/// Case-folds and strips separators, leaving space-delimited tokens.
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out.trim().to_string()
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// Similarity of two names in [0, 1]. Exact normalized equality is 1.0;
/// otherwise a blend of edit-distance similarity and token overlap.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);

    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    let edit = jaro_winkler(&na.replace(' ', ""), &nb.replace(' ', ""));
    let overlap = token_overlap(&na, &nb);

    0.6 * edit + 0.4 * overlap
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::api_spec::FieldSpec;

    fn entity(name: &str, fields: &[&str]) -> Entity {
        Entity {
            name: name.into(),
            description: String::new(),
            fields: fields
                .iter()
                .map(|f| FieldSpec {
                    name: (*f).into(),
                    field_type: "string".into(),
                })
                .collect(),
            endpoints: Vec::new(),
        }
    }

    fn table(name: &str, columns: &[&str]) -> DestinationTable {
        DestinationTable {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    fn schema(tables: Vec<DestinationTable>) -> DestinationSchema {
        DestinationSchema {
            id: "warehouse".into(),
            tables,
        }
    }

    fn spec_with(entities: Vec<Entity>) -> ApiSpec {
        ApiSpec {
            platform: "example".into(),
            overview: String::new(),
            base_url: "https://api.example.com".into(),
            authentication_method: String::new(),
            endpoints: Vec::new(),
            entities,
            rate_limits: None,
            pagination_note: None,
            integration_notes: String::new(),
        }
    }

    #[test]
    fn empty_spec_maps_to_empty_mapping() {
        let mapper = OntologyMapper::new(0.6);
        let mapping = mapper.map(
            &spec_with(Vec::new()),
            &schema(vec![table("users", &["id"])]),
        );
        assert!(mapping.entries.is_empty());
        assert_eq!(mapping.schema_id, "warehouse");
    }

    #[test]
    fn exact_name_match_scores_one() {
        let mapper = OntologyMapper::new(0.6);
        let mapping = mapper.map(
            &spec_with(vec![entity("users", &["id", "email"])]),
            &schema(vec![table("users", &["id", "email"])]),
        );

        let target = mapping.target_for("users").expect("mapped");
        assert!((target.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(target.fields.len(), 2);
    }

    #[test]
    fn separator_and_case_differences_still_match_exactly() {
        assert!((name_similarity("User-Accounts", "user_accounts") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn below_threshold_entities_stay_unmapped() {
        let mapper = OntologyMapper::new(0.6);
        let mapping = mapper.map(
            &spec_with(vec![entity("invoices", &["id"])]),
            &schema(vec![table("employees", &["badge"])]),
        );
        assert!(mapping.target_for("invoices").is_none());
        assert_eq!(mapping.entries.len(), 1);
    }

    #[test]
    fn mapping_is_deterministic() {
        let mapper = OntologyMapper::new(0.3);
        let spec = spec_with(vec![entity("users", &["id", "name"]), entity("orders", &["id"])]);
        let dest = schema(vec![
            table("user_records", &["id", "full_name"]),
            table("orders", &["id", "total"]),
        ]);

        let first = mapper.map(&spec, &dest);
        for _ in 0..10 {
            assert_eq!(mapper.map(&spec, &dest), first);
        }
    }

    #[test]
    fn equal_scores_prefer_more_matched_fields() {
        // "user_a" and "user_b" score identically against "user"; only
        // user_b's columns line up with the entity's fields.
        let mapper = OntologyMapper::new(0.3);
        let mapping = mapper.map(
            &spec_with(vec![entity("user", &["id", "email"])]),
            &schema(vec![
                table("user_a", &["zzz"]),
                table("user_b", &["id", "email"]),
            ]),
        );

        let target = mapping.target_for("user").expect("mapped");
        assert_eq!(target.table, "user_b");
    }

    #[test]
    fn full_ties_break_lexicographically() {
        let mapper = OntologyMapper::new(0.3);
        let mapping = mapper.map(
            &spec_with(vec![entity("user", &[])]),
            &schema(vec![table("user_b", &[]), table("user_a", &[])]),
        );

        let target = mapping.target_for("user").expect("mapped");
        assert_eq!(target.table, "user_a");
    }

    #[test]
    fn field_mapping_is_scoped_to_chosen_table() {
        let mapper = OntologyMapper::new(0.6);
        let mapping = mapper.map(
            &spec_with(vec![entity("users", &["email_address", "created"])]),
            &schema(vec![table("users", &["email_address", "created_at"])]),
        );

        let target = mapping.target_for("users").expect("mapped");
        let email = target
            .fields
            .iter()
            .find(|f| f.source_field == "email_address")
            .expect("email mapped");
        assert_eq!(email.column, "email_address");
        assert!((email.confidence - 1.0).abs() < f64::EPSILON);
    }
}
