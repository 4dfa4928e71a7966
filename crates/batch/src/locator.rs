//! Vector file discovery

use crate::summary::SUMMARY_FILE_NAME;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};
use zonestat_core::io::{extension_of, VECTOR_EXTENSIONS};

/// Finds candidate vector files under an input root.
///
/// Recursive, never follows symlinks, never opens the files. Results are
/// sorted by full path.
#[derive(Debug, Clone)]
pub struct VectorFileLocator {
    root: PathBuf,
    min_file_size: u64,
    excluded: Vec<PathBuf>,
    output_suffix: Option<String>,
}

impl VectorFileLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_file_size: 1,
            excluded: Vec::new(),
            output_suffix: None,
        }
    }

    /// Skip files smaller than `bytes`
    pub fn min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    /// Skip a directory and everything below it.
    ///
    /// The root itself is never skipped; pair with [`skip_outputs`] when the
    /// results are written straight into the root.
    ///
    /// [`skip_outputs`]: Self::skip_outputs
    pub fn exclude(mut self, dir: impl AsRef<Path>) -> Self {
        // Compared by canonical path; a directory that does not exist yet
        // cannot contain anything to skip.
        if let Ok(canonical) = dir.as_ref().canonicalize() {
            self.excluded.push(canonical);
        }
        self
    }

    /// Skip result files of a run using `suffix`, and the run summary
    pub fn skip_outputs(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = Some(suffix.into());
        self
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && !self.excluded.is_empty()
            && entry
                .path()
                .canonicalize()
                .map(|p| self.excluded.contains(&p))
                .unwrap_or(false)
    }

    fn is_candidate(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_file() {
            return false;
        }

        let supported = extension_of(entry.path())
            .map(|ext| VECTOR_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !supported {
            return false;
        }

        if self.is_previous_output(entry.path()) {
            debug!("skipping result file {}", entry.path().display());
            return false;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() < self.min_file_size => {
                warn!(
                    "Skipping {} ({} bytes, below the {} byte minimum)",
                    entry.path().display(),
                    meta.len(),
                    self.min_file_size
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                false
            }
        }
    }

    /// `<stem><suffix>.geojson`, `<stem><suffix>_<n>.geojson` or the summary
    fn is_previous_output(&self, path: &Path) -> bool {
        let Some(suffix) = self.output_suffix.as_deref() else {
            return false;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name == SUMMARY_FILE_NAME {
            return true;
        }
        if extension_of(path).as_deref() != Some("geojson") {
            return false;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };

        let base = match stem.rsplit_once('_') {
            Some((head, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => head,
            _ => stem,
        };
        stem.ends_with(suffix) || base.ends_with(suffix)
    }

    /// Discover every candidate file
    pub fn locate(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                let excluded = self.is_excluded(entry);
                if excluded {
                    debug!("not descending into excluded {}", entry.path().display());
                }
                !excluded
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Cannot read directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| self.is_candidate(entry))
            .map(DirEntry::into_path)
            .collect();

        files.sort();
        debug!("found {} vector files under {}", files.len(), self.root.display());
        files
    }
}
