use std::path::Path;

use anyhow::Result;
use gcs_core::canonicalize;
use serde_json::Value;

use super::read_json;

pub fn run(path: &Path, show_canonical: bool) -> Result<()> {
    let raw: Value = read_json(path)?;
    let canonical = canonicalize(&raw)?;
    let hash = canonical.hash()?;

    if show_canonical {
        println!("{}", serde_json::to_string(canonical.as_value())?);
    }
    println!("{hash}");
    Ok(())
}
