//! Schema-document loading. YAML is the native dialect; `.json` inputs go
//! through serde_json with path context in error messages.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub fn from_yaml_str<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    serde_yaml::from_str(src).map_err(|err| err.to_string())
}

pub fn from_json_str<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path}: {}", err.into_inner()))
        }
    }
}

/// Read a schema file into a document tree, choosing the parser by extension.
pub fn document_from_path(path: &Path) -> Result<serde_yaml::Value> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema file {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let parsed = if is_json {
        from_json_str(&src)
    } else {
        from_yaml_str(&src)
    };
    parsed.map_err(|msg| anyhow::anyhow!("parsing schema file {}: {msg}", path.display()))
}
