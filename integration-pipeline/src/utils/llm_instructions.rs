use serde_json::json;

pub static SPEC_EXTRACTION_SYSTEM_MESSAGE: &str = "You are an expert API analyst specializing \
in data integration. Your job is to analyze API documentation and extract specifications that \
will be used by other agents to map API data to database ontologies and to create programmatic \
calls for data ingestion. Focus on extracting information that helps automated data integration \
workflows. Extract ALL available endpoints and entity types. Be comprehensive and thorough.";

pub fn spec_extraction_user_message(document: &str) -> String {
    format!(
        "Analyze this API documentation and extract specifications for data integration.\n\n\
         Documentation Content:\n{document}\n\n\
         Look for all API endpoints mentioned (with their query parameters), all data \
         models/entities described, the \
         authentication method, rate limits, and pagination details. Each entity must list the \
         endpoint paths that serve it, and only paths present in the endpoints list. If any \
         information is not available, use an empty string for that field."
    )
}

/// JSON schema the extraction backends are constrained to. Mirrors the
/// `ApiSpec` serde shape exactly.
pub fn get_api_spec_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "platform": { "type": "string" },
            "overview": { "type": "string" },
            "base_url": { "type": "string" },
            "authentication_method": { "type": "string" },
            "endpoints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "method": { "type": "string" },
                        "path": { "type": "string" },
                        "description": { "type": "string" },
                        "parameters": {
                            "type": "array",
                            "items": { "type": "string" }
                        },
                        "entity": { "type": ["string", "null"] },
                        "auth_required": { "type": "boolean" },
                        "rate_limit_note": { "type": ["string", "null"] }
                    },
                    "required": ["method", "path", "description", "parameters", "entity", "auth_required", "rate_limit_note"],
                    "additionalProperties": false
                }
            },
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "fields": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "field_type": { "type": "string" }
                                },
                                "required": ["name", "field_type"],
                                "additionalProperties": false
                            }
                        },
                        "endpoints": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["name", "description", "fields", "endpoints"],
                    "additionalProperties": false
                }
            },
            "rate_limits": { "type": ["string", "null"] },
            "pagination_note": { "type": ["string", "null"] },
            "integration_notes": { "type": "string" }
        },
        "required": ["platform", "overview", "base_url", "authentication_method", "endpoints",
                     "entities", "rate_limits", "pagination_note", "integration_notes"],
        "additionalProperties": false
    })
}

pub static JOB_SYNTHESIS_SYSTEM_MESSAGE: &str = "You are an expert data integration agent. \
Given an API specification and a confirmed entity-to-table mapping, produce an ingestion \
routine as a JSON program. The routine may only use the provided instruction set: fetch steps \
issuing GET requests with optional page or cursor pagination and per-field column mappings. \
Do not invent endpoints, entities or capabilities. Only emit steps for the mapped entities \
you were given.";

pub fn job_synthesis_user_message(
    platform: &str,
    base_url: &str,
    auth_kind: &str,
    pagination_hint: &str,
    mapped_endpoints: &str,
) -> String {
    format!(
        "Platform: {platform}\nBase URL: {base_url}\nAuthentication scheme: {auth_kind}\n\
         Pagination style: {pagination_hint}\n\n\
         Mapped entities and their endpoints:\n{mapped_endpoints}\n\n\
         Produce one fetch step per mapped entity against its listing endpoint, with the \
         field-to-column mappings given above. Paths must be relative to the base URL."
    )
}

/// JSON schema for the synthesized routine. Mirrors `JobProgram`.
pub fn get_job_program_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "auth": {
                "type": "object",
                "properties": {
                    "scheme": { "type": "string" },
                    "header": { "type": ["string", "null"] }
                },
                "required": ["scheme", "header"],
                "additionalProperties": false
            },
            "base_url": { "type": "string" },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "op": { "type": "string" },
                        "entity": { "type": "string" },
                        "table": { "type": "string" },
                        "request": {
                            "type": "object",
                            "properties": {
                                "method": { "type": "string" },
                                "path": { "type": "string" }
                            },
                            "required": ["method", "path"],
                            "additionalProperties": false
                        },
                        "pagination": {
                            "type": "object",
                            "properties": {
                                "kind": { "type": "string", "enum": ["none", "page", "cursor"] },
                                "param": { "type": ["string", "null"] }
                            },
                            "required": ["kind", "param"],
                            "additionalProperties": false
                        },
                        "fields": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "source": { "type": "string" },
                                    "column": { "type": "string" }
                                },
                                "required": ["source", "column"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["op", "entity", "table", "request", "pagination", "fields"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["auth", "base_url", "steps"],
        "additionalProperties": false
    })
}
