//! Filesystem lookups between include spellings and resolved files.

use std::path::{Path, PathBuf};

use crate::entry::FilePath;

/// Directory depth a search descends to before giving up on a branch.
pub const MAX_SEARCH_DEPTH: usize = 64;

/// Finds the file an include spelling refers to by searching each root depth first.
///
/// A file only matches when its path ends with every component of `spelling`,
/// so `foo/bar.h` never resolves to an unrelated `baz/bar.h`.
/// Symlinks are followed, link loops are skipped.
pub fn resolve(spelling: &str, search_roots: &[PathBuf]) -> Option<FilePath> {
	let wanted = Path::new(spelling.trim());
	let name = wanted.file_name()?;

	for root in search_roots {
		let walker = walkdir::WalkDir::new(root)
			.follow_links(true)
			.max_depth(MAX_SEARCH_DEPTH)
			.sort_by(|a, b| {
				/* Files of a directory before its subdirectories */
				a.file_type().is_dir().cmp(&b.file_type().is_dir())
					.then_with(|| a.file_name().cmp(b.file_name()))
			});

		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					log::trace!("Skipping while searching for {}: {}", spelling, e);
					continue;
				},
			};
			if entry.file_type().is_file() && entry.file_name() == name && entry.path().ends_with(wanted) {
				log::debug!("Resolved {} to {}", spelling, entry.path().display());
				return Some(FilePath::from_path(entry.path()));
			}
		}
	}

	log::debug!("Could not resolve {}", spelling);
	None
}

/// Spelling of `resolved` relative to the most specific root containing it,
/// or its bare file name when no root does.
pub fn shortest_spelling(resolved: &FilePath, search_roots: &[PathBuf]) -> String {
	let path = resolved.as_path();
	let relative = search_roots.iter()
		.filter(|root| !root.as_os_str().is_empty() && path.starts_with(root))
		.max_by_key(|root| root.components().count())
		.and_then(|root| pathdiff::diff_paths(path, root))
		.filter(|p| !p.as_os_str().is_empty());

	match relative {
		Some(relative) => relative.components()
			.map(|c| c.as_os_str().to_string_lossy())
			.collect::<Vec<_>>()
			.join("/"),
		None => resolved.file_name().unwrap_or(resolved.as_str()).to_string(),
	}
}

/// Public forwarding header for a private framework header, e.g. `QtCore/qstring.h` to `QtCore/QString`.
///
/// Only applies inside a `Qt*` directory, and only when exactly one sibling qualifies.
pub fn prefer_public_header(file: &FilePath) -> Option<FilePath> {
	let path = file.as_path();
	let dir = path.parent()?;
	if !dir.components().any(|c| c.as_os_str().to_string_lossy().starts_with("Qt")) {
		return None;
	}

	let stem = path.file_stem()?.to_str()?;
	if stem.chars().any(char::is_uppercase) {
		return None;
	}

	let mut public = std::fs::read_dir(dir).ok()?
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.filter(|p| p != path && p.is_file())
		.filter(|p| p.file_name().and_then(|n| n.to_str()).map_or(false, |n| n != stem && n.eq_ignore_ascii_case(stem)));

	let first = public.next()?;
	if public.next().is_some() {
		return None;
	}
	Some(FilePath::from_path(first))
}

/// Whether `file` lies inside the project and should be written with quotes.
pub fn is_local(file: &FilePath, project_root: &Path) -> bool {
	!project_root.as_os_str().is_empty() && file.as_path().starts_with(project_root)
}

#[cfg(test)]
mod test {
	use super::*;

	fn touch(root: &Path, relative: &str) -> PathBuf {
		let path = root.join(relative);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, "").unwrap();
		path
	}

	#[test]
	fn resolve_matches_whole_suffix() {
		let dir = tempfile::tempdir().unwrap();
		touch(dir.path(), "b/bar.h");
		let wanted = touch(dir.path(), "a/include/foo/bar.h");
		assert_eq!(resolve("foo/bar.h", &[dir.path().to_path_buf()]), Some(FilePath::from_path(wanted)));
	}

	#[test]
	fn resolve_rejects_same_name_elsewhere() {
		let dir = tempfile::tempdir().unwrap();
		touch(dir.path(), "baz/bar.h");
		assert_eq!(resolve("foo/bar.h", &[dir.path().to_path_buf()]), None);
	}

	#[test]
	fn resolve_prefers_shallow_file() {
		let dir = tempfile::tempdir().unwrap();
		touch(dir.path(), "a/bar.h");
		let wanted = touch(dir.path(), "bar.h");
		assert_eq!(resolve("bar.h", &[dir.path().to_path_buf()]), Some(FilePath::from_path(wanted)));
	}

	#[test]
	fn resolve_searches_roots_in_order() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		let wanted = touch(first.path(), "x.h");
		touch(second.path(), "x.h");
		assert_eq!(resolve("x.h", &[first.path().to_path_buf(), second.path().to_path_buf()]), Some(FilePath::from_path(wanted)));
	}

	#[cfg(unix)]
	#[test]
	fn resolve_terminates_on_link_loop() {
		let dir = tempfile::tempdir().unwrap();
		touch(dir.path(), "sub/a.h");
		std::os::unix::fs::symlink(dir.path(), dir.path().join("sub").join("loop")).unwrap();
		assert_eq!(resolve("missing.h", &[dir.path().to_path_buf()]), None);
	}

	#[test] fn shortest_spelling_uses_longest_root() { assert_eq!(shortest_spelling(&"/usr/include/qt/QtCore/QString".into(), &["/usr/include".into(), "/usr/include/qt".into()]), "QtCore/QString") }
	#[test] fn shortest_spelling_falls_back_to_name() { assert_eq!(shortest_spelling(&"/opt/lib/x.h".into(), &["/usr/include".into()]), "x.h") }
	#[test] fn shortest_spelling_ignores_partial_component() { assert_eq!(shortest_spelling(&"/usr/include2/x/y.h".into(), &["/usr/include".into()]), "y.h") }
	#[test] fn is_local_inside_project() { assert!(is_local(&"/p/src/a.h".into(), Path::new("/p"))) }
	#[test] fn is_local_outside_project() { assert!(!is_local(&"/usr/include/a.h".into(), Path::new("/p"))) }
	#[test] fn is_local_without_project() { assert!(!is_local(&"/p/a.h".into(), Path::new(""))) }

	#[test]
	fn prefer_public_header_finds_forwarding_header() {
		let dir = tempfile::tempdir().unwrap();
		let private = touch(dir.path(), "QtCore/qstring.h");
		let public = touch(dir.path(), "QtCore/QString");
		assert_eq!(prefer_public_header(&FilePath::from_path(private)), Some(FilePath::from_path(public)));
	}

	#[test]
	fn prefer_public_header_ignores_other_frameworks() {
		let dir = tempfile::tempdir().unwrap();
		let private = touch(dir.path(), "core/qstring.h");
		touch(dir.path(), "core/QString");
		assert_eq!(prefer_public_header(&FilePath::from_path(private)), None);
	}
}
