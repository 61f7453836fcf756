//! Preprocess serializer.
//! Projects a resolved mapping back into mapping-document records so the
//! output of one run can be the mappings input of the next.

use crate::error::{Error, Result};
use crate::mapping::RawRecord;
use crate::resolver::Resolution;

/// Records for every resolved name, sorted by name, carrying the recorded
/// file/uri/base64 kinds. `env` is never emitted.
pub fn to_records(resolution: &Resolution) -> Vec<RawRecord> {
    let mut names: Vec<&String> = resolution.mapping.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let kinds = resolution.kinds.get(name).copied().unwrap_or_default();
            RawRecord::from((name.as_str(), resolution.mapping[name].as_str(), kinds))
        })
        .collect()
}

/// Serializes the resolution as a YAML mapping document.
///
/// # Errors
/// * `Error::TransformError` if YAML serialization fails
pub fn to_yaml(resolution: &Resolution) -> Result<String> {
    serde_yaml::to_string(&to_records(resolution))
        .map_err(|e| Error::TransformError(format!("can't serialize mappings: {e}")))
}
