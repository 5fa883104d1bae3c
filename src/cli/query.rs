//! `assetweave resolve` and `assetweave list`.

use anyhow::Result;
use assetweave::{Accept, Environment};
use serde::Serialize;

use super::print_json;

#[derive(Serialize)]
struct Resolution {
    logical_path: String,
    path: String,
    content_type: String,
    uri: String,
    /// Directories consulted while searching.
    dependencies: Vec<String>,
}

pub fn resolve(env: &Environment, logical: &str, accept: Option<&str>) -> Result<()> {
    let accept = accept.map_or_else(Accept::any, Accept::parse);
    let resolved = env.index().resolve(logical, &accept)?;
    let entity = resolved.entity;

    print_json(
        &Resolution {
            uri: entity.uri(&entity.content_type).build(),
            logical_path: entity.logical_path,
            path: entity.path.display().to_string(),
            content_type: entity.content_type,
            dependencies: resolved.dependencies.into_iter().collect(),
        },
        true,
    )
}

pub fn list(env: &Environment) -> Result<()> {
    for logical in env.logical_paths() {
        println!("{logical}");
    }
    Ok(())
}
