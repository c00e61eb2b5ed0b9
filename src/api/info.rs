//! Node information payload and its JSON Schema

use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::api::server::RuntimeInfo;
use crate::error::ApiError;
use crate::protocol::{GitInfo, NodeInfo, VersionInfo};
use crate::sources::SourceRegistry;

/// Shape every `/v4/info` response must have
pub fn info_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": [
            "version", "buildTime", "git", "runtime",
            "sourceManagers", "filters", "plugins"
        ],
        "properties": {
            "version": {
                "type": "object",
                "required": ["semver", "major", "minor", "patch"],
                "properties": {
                    "semver": { "type": "string", "minLength": 1 },
                    "major": { "type": "integer", "minimum": 0 },
                    "minor": { "type": "integer", "minimum": 0 },
                    "patch": { "type": "integer", "minimum": 0 },
                    "preRelease": { "type": ["string", "null"] },
                    "build": { "type": ["string", "null"] }
                }
            },
            "buildTime": { "type": "integer" },
            "git": {
                "type": "object",
                "required": ["branch", "commit", "commitTime"],
                "properties": {
                    "branch": { "type": "string" },
                    "commit": { "type": "string" },
                    "commitTime": { "type": "integer" }
                }
            },
            "runtime": { "type": "string", "minLength": 1 },
            "sourceManagers": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 },
                "uniqueItems": true
            },
            "filters": { "type": "array", "items": { "type": "string" } },
            "plugins": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "version"],
                    "properties": {
                        "name": { "type": "string" },
                        "version": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn compiled_schema() -> Result<&'static JSONSchema, ApiError> {
    static SCHEMA: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| JSONSchema::compile(&info_schema()).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ApiError::Internal(format!("Info schema failed to compile: {}", e)))
}

/// Assemble the node info from the runtime facts and the registered sources
pub fn build_node_info(runtime: &RuntimeInfo, sources: &SourceRegistry) -> NodeInfo {
    let version = VersionInfo::parse(&runtime.version).unwrap_or_else(|| VersionInfo {
        semver: runtime.version.clone(),
        major: 0,
        minor: 0,
        patch: 0,
        pre_release: None,
        build: None,
    });

    NodeInfo {
        version,
        build_time: runtime.build_time,
        git: GitInfo {
            branch: runtime.git_branch.clone(),
            commit: runtime.git_commit.clone(),
            commit_time: runtime.git_commit_time,
        },
        runtime: format!(
            "rust/{}-{} uptime={}s",
            std::env::consts::OS,
            std::env::consts::ARCH,
            runtime.started_at.elapsed().as_secs()
        ),
        source_managers: sources.names(),
        filters: Vec::new(),
        plugins: Vec::new(),
    }
}

/// Serialize `info` and check it against the schema
///
/// A violation is logged and reported as an internal error; the invalid
/// payload never leaves the node.
pub fn validated_info(info: &NodeInfo) -> Result<Value, ApiError> {
    let value = serde_json::to_value(info)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize info: {}", e)))?;
    validate_info_value(&value)?;
    Ok(value)
}

pub fn validate_info_value(value: &Value) -> Result<(), ApiError> {
    let schema = compiled_schema()?;
    if let Err(errors) = schema.validate(value) {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        tracing::error!("Info payload failed schema validation: {}", messages.join("; "));
        return Err(ApiError::Internal("Info payload failed validation".to_string()));
    }
    Ok(())
}
