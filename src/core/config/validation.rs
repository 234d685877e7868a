use serde_json::{Map, Value};

use crate::core::errors::RagError;

/// Checks shapes and ranges of the raw YAML tree before it is deserialized.
pub fn validate_config(config: &Value) -> Result<(), RagError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 1_000_000)?;
        validate_u64_field(rag, "rag.retrieval_k", "retrieval_k", 1, 1_000)?;
        validate_u64_field(
            rag,
            "rag.embedding_dimension",
            "embedding_dimension",
            1,
            65_536,
        )?;
        validate_u64_field(rag, "rag.history_turns", "history_turns", 0, 1_000)?;
        validate_u64_field(
            rag,
            "rag.fallback_min_overlap",
            "fallback_min_overlap",
            1,
            1_000,
        )?;
        validate_f64_field(
            rag,
            "rag.grounding_min_support",
            "grounding_min_support",
            0.0,
            1.0,
        )?;
        validate_u64_field(rag, "rag.session_ttl_secs", "session_ttl_secs", 1, 31_536_000)?;
        validate_u64_field(rag, "rag.session_sweep_secs", "session_sweep_secs", 1, 86_400)?;
        validate_enum_field(
            rag,
            "rag.embedder_backend",
            "embedder_backend",
            &["local", "remote"],
        )?;
        validate_enum_field(
            rag,
            "rag.generation_backend",
            "generation_backend",
            &["none", "remote"],
        )?;
        validate_enum_field(
            rag,
            "rag.storage_backend",
            "storage_backend",
            &["sqlite", "memory"],
        )?;

        if let (Some(size), Some(overlap)) = (
            rag.get("chunk_size").and_then(|v| v.as_u64()),
            rag.get("chunk_overlap").and_then(|v| v.as_u64()),
        ) {
            if overlap >= size {
                return Err(RagError::Configuration(format!(
                    "Invalid config at 'rag.chunk_overlap': must be smaller than chunk_size ({})",
                    size
                )));
            }
        }
    }

    if let Some(remote) = expect_optional_object(root, "remote")? {
        validate_optional_string_field(remote, "remote.base_url", "base_url")?;
        validate_optional_string_field(remote, "remote.api_key", "api_key")?;
        validate_optional_string_field(remote, "remote.embedding_model", "embedding_model")?;
        validate_optional_string_field(remote, "remote.chat_model", "chat_model")?;
        validate_f64_field(remote, "remote.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(remote, "remote.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(
            remote,
            "remote.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
        validate_u64_field(remote, "remote.batch_size", "batch_size", 1, 4_096)?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_u64_field(
            server,
            "server.fetch_timeout_secs",
            "fetch_timeout_secs",
            1,
            3_600,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, RagError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "non-negative integer"));
    };
    if number < min || number > max {
        return Err(RagError::Configuration(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(RagError::Configuration(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(RagError::Configuration(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> RagError {
    RagError::Configuration(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
