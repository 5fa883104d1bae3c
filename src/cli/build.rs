//! `assetweave build`.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use assetweave::{ArtifactDescriptor, Environment, log};

use super::{BuildArgs, print_json};

pub fn run(env: &mut Environment, args: &BuildArgs) -> Result<()> {
    if let Some(jobs) = args.jobs {
        env.set_jobs(jobs);
    }
    if let Some(version) = &args.version_tag {
        env.set_version(version.clone());
    }

    let targets = if args.targets.is_empty() {
        env.logical_paths()
    } else {
        args.targets.clone()
    };
    if targets.is_empty() {
        bail!("nothing to build: no files under {:?}", env.roots());
    }

    let start = Instant::now();
    let assets = env.build_all(targets.as_slice()).context("build failed")?;

    let descriptors: Vec<ArtifactDescriptor> = assets.iter().map(|a| a.descriptor()).collect();
    print_json(&descriptors, args.pretty)?;

    let stats = env.cache().stats();
    log!(
        "build";
        "{} assets in {:.2?} (cache: {} hits, {} misses)",
        descriptors.len(),
        start.elapsed(),
        stats.hits,
        stats.misses
    );
    Ok(())
}
