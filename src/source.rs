//! Identifier sources
//!
//! Resource identifiers come from a flat text list: one per line, surrounding
//! whitespace trimmed, blank lines and `#` comments ignored.

use crate::error::{Error, Result};
use crate::types::ResourceId;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Where resource identifiers come from
#[derive(Clone, Debug)]
pub enum IdentifierSource {
    /// A text file with one identifier per line
    File(PathBuf),
    /// Standard input, one identifier per line
    Stdin,
    /// An in-memory list
    List(Vec<String>),
}

impl IdentifierSource {
    /// Interpret a CLI argument: `-` means stdin, anything else is a file path
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            IdentifierSource::Stdin
        } else {
            IdentifierSource::File(PathBuf::from(arg))
        }
    }

    /// Read and validate the identifiers
    ///
    /// Invalid and duplicate entries are skipped with a warning; only an
    /// unreadable source is an error.
    pub async fn load(&self) -> Result<Vec<ResourceId>> {
        match self {
            IdentifierSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to read identifier list '{}': {}", path.display(), e),
                    ))
                })?;
                let ids = parse_identifiers(content.lines());
                tracing::info!(path = %path.display(), count = ids.len(), "Loaded resource identifiers");
                Ok(ids)
            }
            IdentifierSource::Stdin => {
                let mut content = String::new();
                tokio::io::stdin().read_to_string(&mut content).await?;
                let ids = parse_identifiers(content.lines());
                tracing::info!(count = ids.len(), "Loaded resource identifiers from stdin");
                Ok(ids)
            }
            IdentifierSource::List(items) => Ok(parse_identifiers(items.iter().map(String::as_str))),
        }
    }
}

/// Parse identifier lines, keeping the first occurrence of each identifier
pub fn parse_identifiers<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<ResourceId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match ResourceId::new(line) {
            Ok(id) => {
                if seen.insert(id.clone()) {
                    ids.push(id);
                } else {
                    tracing::warn!(line = index + 1, resource = %id, "Skipping duplicate resource identifier");
                }
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping invalid resource identifier");
            }
        }
    }

    ids
}
