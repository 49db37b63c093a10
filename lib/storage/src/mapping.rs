//! `title_to_index.json`: a JSON object mapping raw titles to item ids.

use anyhow::{anyhow, Context, Result};
use cinesim_core::TitleRegistry;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Load the mapping in document order.
pub fn read_title_mapping<P: AsRef<Path>>(path: P) -> Result<TitleRegistry> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_title_mapping(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_title_mapping(text: &str) -> Result<TitleRegistry> {
    let object: Map<String, Value> = serde_json::from_str(text)?;
    let mut pairs = Vec::with_capacity(object.len());
    for (title, value) in object {
        let id = value
            .as_u64()
            .and_then(|id| usize::try_from(id).ok())
            .ok_or_else(|| anyhow!("title {:?} maps to {} instead of an item id", title, value))?;
        pairs.push((title, id));
    }
    Ok(TitleRegistry::from_pairs(pairs))
}

/// Write `(title, id)` pairs as a JSON object, preserving order.
pub fn write_title_mapping<P, S>(path: P, pairs: &[(S, usize)]) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let object: Map<String, Value> = pairs
        .iter()
        .map(|(title, id)| (title.as_ref().to_string(), Value::from(*id)))
        .collect();
    let text = serde_json::to_string_pretty(&Value::Object(object))?;
    fs::write(path.as_ref(), text).with_context(|| format!("writing {}", path.as_ref().display()))?;
    Ok(())
}
