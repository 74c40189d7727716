//! Corpus walker.
//!
//! Walks the story directory once per generation and records every
//! accepted file in a [`PathMap`] under its normalized key. This is the
//! only code that enumerates the corpus.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use story_corpus_core::pathmap::PathMap;

use crate::config::CorpusConfig;
use crate::error::{BuildError, SyncWarning};

#[derive(Debug, Default)]
pub struct CorpusScan {
    pub map: PathMap,
    pub warnings: Vec<SyncWarning>,
}

pub fn scan_corpus(config: &CorpusConfig) -> Result<CorpusScan, BuildError> {
    let root = config.story_path();
    scan_dir(
        &root,
        &config.include_globs,
        &config.exclude_globs,
        config.follow_symlinks,
    )
}

pub fn scan_dir(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
    follow_symlinks: bool,
) -> Result<CorpusScan, BuildError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(BuildError::CorpusInaccessible {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            })
        }
        Err(e) => {
            return Err(BuildError::CorpusInaccessible {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }

    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(exclude_globs)?;

    let mut scan = CorpusScan::default();

    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable corpus entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        if let Err(ambiguity) = scan.map.insert_file(&rel_str, path.to_path_buf()) {
            let warning = SyncWarning::from(ambiguity);
            warn!("{}", warning);
            scan.warnings.push(warning);
        }
    }

    debug!(
        files = scan.map.file_count(),
        dirs = scan.map.dir_count(),
        "corpus scanned"
    );
    Ok(scan)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, BuildError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| BuildError::Scan(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| BuildError::Scan(e.to_string()))
}
