//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::path::{Path, PathBuf};

use incorg::{DependencySnapshot, FilePath};

#[derive(Debug, thiserror::Error)]
pub enum TestUtilsError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("library error: {0}")]
	Incorg(#[from] incorg::Error),
}

/// Writes `(relative path, contents)` pairs into a fresh temporary directory.
pub fn write_tree(files: &[(&str, &str)]) -> Result<tempfile::TempDir, TestUtilsError> {
	let dir = tempfile::tempdir()?;
	for (relative, contents) in files {
		let path = dir.path().join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, contents)?;
	}
	Ok(dir)
}

/// Canonical identity of `relative` inside `root`.
pub fn file_in(root: &Path, relative: &str) -> FilePath {
	FilePath::from_path(root.join(relative))
}

/// Canonical form of a directory, for use as a project or search root.
pub fn canonical(root: &Path) -> Result<PathBuf, TestUtilsError> {
	Ok(std::fs::canonicalize(root)?)
}

/// Writes a header tree and scans it with the tree root as the only search root.
pub fn scanned_tree(files: &[(&str, &str)]) -> Result<(tempfile::TempDir, DependencySnapshot), TestUtilsError> {
	let dir = write_tree(files)?;
	let root = canonical(dir.path())?;
	let snapshot = DependencySnapshot::scan(&[root.clone()], &[root])?;
	Ok((dir, snapshot))
}
