//! Include entries and the file identities they point at.

use std::path::Path;
use serde::{Serialize, Deserialize};

/// Identity of a file: an absolute, canonical path.
///
/// An empty path stands for a file that has not been resolved yet.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(String);

impl FilePath {
	pub fn new(path: impl Into<String>) -> Self {
		FilePath(path.into())
	}

	/// Canonicalizes `path` when it exists on disk, otherwise keeps it as given.
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();
		let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
		FilePath(path.to_string_lossy().into_owned())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn as_path(&self) -> &Path {
		Path::new(&self.0)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Directory containing the file, empty for bare names.
	pub fn parent_dir(&self) -> &Path {
		self.as_path().parent().unwrap_or_else(|| Path::new(""))
	}

	pub fn file_name(&self) -> Option<&str> {
		self.as_path().file_name().and_then(|n| n.to_str())
	}
}

impl std::fmt::Display for FilePath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for FilePath {
	fn from(value: &str) -> Self { FilePath::new(value) }
}

impl From<String> for FilePath {
	fn from(value: String) -> Self { FilePath::new(value) }
}

impl AsRef<Path> for FilePath {
	fn as_ref(&self) -> &Path {
		self.as_path()
	}
}

/// A single top level include, either present in the document or about to be added.
///
/// Two entries are the same entry when they resolve to the same file, spelling and
/// position play no part in comparisons.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
	/// The included file, empty if not yet resolved.
	pub resolved_file: FilePath,
	/// Text between the quotes or brackets, empty if not yet computed.
	pub spelling: String,
	/// Renders as `"..."` when true, `<...>` otherwise.
	pub is_local: bool,
	/// Position in the document, `None` for entries the organizer synthesized.
	pub source_line: Option<usize>,
	/// Blank line separated group this entry belongs to.
	pub group_index: usize,
	pub is_new: bool,
}

impl Entry {
	pub fn new_resolved(resolved_file: impl Into<FilePath>, spelling: impl Into<String>, source_line: Option<usize>, is_local: bool) -> Self {
		Entry {
			resolved_file: resolved_file.into(),
			spelling: spelling.into(),
			is_local,
			source_line,
			group_index: 0,
			is_new: false,
		}
	}

	/// An entry written in the document whose file could not be found.
	pub fn unresolved(spelling: impl Into<String>, source_line: Option<usize>, is_local: bool) -> Self {
		Entry::new_resolved(FilePath::default(), spelling, source_line, is_local)
	}

	/// A brand new entry for `file`, spelling is filled in later.
	pub fn synthesized(file: FilePath) -> Self {
		Entry {
			resolved_file: file,
			is_new: true,
			..Default::default()
		}
	}

	pub fn is_resolved(&self) -> bool {
		!self.resolved_file.is_empty()
	}

	/// Generated meta-object includes are managed by the build and never touched.
	pub fn is_moc(&self) -> bool {
		self.spelling.ends_with(".moc")
			|| (self.spelling.starts_with("moc_") && self.spelling.ends_with(".cpp"))
	}

	pub fn directive(&self) -> String {
		if self.is_local {
			format!("#include \"{}\"", self.spelling)
		} else {
			format!("#include <{}>", self.spelling)
		}
	}

	/// Path used for sorting, falls back to the spelling for unresolved entries.
	pub(crate) fn sort_key(&self) -> &str {
		if self.is_resolved() { self.resolved_file.as_str() } else { &self.spelling }
	}
}

impl std::hash::Hash for Entry {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.resolved_file.hash(state);
	}
}

impl std::cmp::PartialEq for Entry {
	fn eq(&self, other: &Self) -> bool {
		self.resolved_file == other.resolved_file
	}
}

impl std::cmp::Eq for Entry {}

impl std::cmp::Ord for Entry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.resolved_file.cmp(&other.resolved_file)
	}
}

impl std::cmp::PartialOrd for Entry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Display for Entry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_resolved() {
			write!(f, "{}", self.resolved_file)
		} else {
			write!(f, "{} (unresolved)", self.spelling)
		}
	}
}

/// Renders the directives in order with a blank line between groups.
pub fn render_block(entries: &[Entry]) -> String {
	let mut out = String::new();
	let mut last_group = None;
	for entry in entries {
		if last_group.is_some_and(|g| g != entry.group_index) {
			out.push('\n');
		}
		out.push_str(&entry.directive());
		out.push('\n');
		last_group = Some(entry.group_index);
	}
	out
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn entry_equality_ignores_spelling() { assert_eq!(Entry::new_resolved("/p/a.h", "a.h", Some(1), true), Entry::new_resolved("/p/a.h", "p/a.h", None, false)) }
	#[test] fn entry_local_directive_is_quoted() { assert_eq!(Entry::new_resolved("/p/a.h", "a.h", None, true).directive(), "#include \"a.h\"") }
	#[test] fn entry_system_directive_is_bracketed() { assert_eq!(Entry::new_resolved("/usr/include/vector", "vector", None, false).directive(), "#include <vector>") }
	#[test] fn entry_moc_suffix_is_detected() { assert!(Entry::unresolved("widget.moc", None, true).is_moc()) }
	#[test] fn entry_moc_prefix_is_detected() { assert!(Entry::unresolved("moc_widget.cpp", None, true).is_moc()) }
	#[test] fn entry_plain_cpp_is_not_moc() { assert!(!Entry::unresolved("widget.cpp", None, true).is_moc()) }
	#[test] fn synthesized_entry_is_new_and_lineless() { let e = Entry::synthesized("/p/a.h".into()); assert!(e.is_new && e.source_line.is_none()) }

	#[test]
	fn render_block_separates_groups() {
		let mut a = Entry::new_resolved("/p/a.h", "a.h", None, true);
		let mut b = Entry::new_resolved("/p/b.h", "b.h", None, true);
		let mut c = Entry::new_resolved("/usr/include/c.h", "c.h", None, false);
		a.group_index = 0;
		b.group_index = 0;
		c.group_index = 1;
		assert_eq!(render_block(&[a, b, c]), "#include \"a.h\"\n#include \"b.h\"\n\n#include <c.h>\n");
	}
}
