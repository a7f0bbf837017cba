//! Identity map: one `<image_name> <identity>` pair per line.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::Identity;

pub type IdentityMap = HashMap<String, Identity>;

pub fn parse_identity_map(content: &str) -> Result<IdentityMap> {
    let mut map = IdentityMap::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::IdentityMap(format!("line {}: expected two fields", lineno + 1)));
        };
        let id: Identity = id
            .parse()
            .map_err(|e| Error::IdentityMap(format!("line {}: {e}", lineno + 1)))?;
        map.insert(name.to_string(), id);
    }
    Ok(map)
}

pub fn load_identity_map<P: AsRef<Path>>(path: P) -> Result<IdentityMap> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let map = parse_identity_map(&content)?;
    info!("Loaded {} identity labels from {}", map.len(), path.as_ref().display());
    Ok(map)
}
