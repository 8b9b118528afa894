//! Builds a [`DependencySnapshot`] by reading include directives from disk.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dependency_index::DependencySnapshot;
use crate::entry::FilePath;

static INCLUDE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\n]+)[>"]"#).expect("include directive regex is valid")
});

const SOURCE_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "inl", "ipp", "tcc", "c", "cc", "cpp", "cxx", "c++", "m", "mm"];

/// An `#include` as written in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directive {
	pub spelling: String,
	pub is_quoted: bool,
}

pub(crate) fn parse_directives(text: &str) -> Vec<Directive> {
	INCLUDE_DIRECTIVE.captures_iter(text)
		.map(|c| Directive {
			spelling: c[2].trim().to_string(),
			is_quoted: &c[1] == "\"",
		})
		.collect()
}

/// Whether `path` looks like something that can contain include directives.
/// Extensionless files are accepted since standard library headers have none.
fn is_source_file(path: &Path) -> bool {
	match path.extension().and_then(|e| e.to_str()) {
		Some(ext) => SOURCE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)),
		None => true,
	}
}

fn resolve_directive(including: &Path, directive: &Directive, search_roots: &[PathBuf]) -> Option<PathBuf> {
	if directive.is_quoted {
		if let Some(dir) = including.parent() {
			let candidate = dir.join(&directive.spelling);
			if candidate.is_file() {
				return Some(candidate);
			}
		}
	}
	search_roots.iter()
		.map(|root| root.join(&directive.spelling))
		.find(|candidate| candidate.is_file())
}

impl DependencySnapshot {
	/// Scans every source file under `roots`, and every file their includes resolve to.
	///
	/// Includes are resolved against the including file's directory for quoted directives,
	/// then against `search_roots` in order.
	///
	/// Unreadable directories and files below a root are logged and skipped.
	///
	/// # Errors
	/// - [`WalkDir`](crate::error::Error::WalkDir) when a root itself cannot be walked.
	pub fn scan(roots: &[PathBuf], search_roots: &[PathBuf]) -> crate::Result<Self> {
		let mut snapshot = DependencySnapshot::new();
		let mut queue = VecDeque::<PathBuf>::new();
		let mut seen = HashSet::<FilePath>::new();

		for root in roots {
			for entry in walkdir::WalkDir::new(root).follow_links(true).sort_by_file_name() {
				let entry = match entry {
					Ok(entry) => entry.into_path(),
					Err(e) if e.depth() == 0 => return Err(e.into()),
					Err(e) => {
						log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
						continue;
					},
				};
				if entry.is_file() && entry.extension().is_some() && is_source_file(&entry) {
					queue.push_back(entry);
				}
			}
		}
		log::debug!("Found {} source files under {} roots", queue.len(), roots.len());

		while let Some(path) = queue.pop_front() {
			let file = FilePath::from_path(&path);
			if !seen.insert(file.clone()) {
				continue;
			}

			let bytes = match std::fs::read(&path) {
				Ok(bytes) => bytes,
				Err(e) => {
					log::warn!("Skipping unreadable file {}: {}", path.display(), e);
					continue;
				},
			};
			snapshot.insert_file(file.clone(), bytes.len() as u64);

			for directive in parse_directives(&String::from_utf8_lossy(&bytes)) {
				match resolve_directive(&path, &directive, search_roots) {
					Some(included) => {
						let included_file = FilePath::from_path(&included);
						snapshot.add_include(&file, included_file.clone());
						if !seen.contains(&included_file) && is_source_file(&included) {
							queue.push_back(included);
						}
					},
					None => log::debug!("Unresolved include {} in {}", directive.spelling, file),
				}
			}
		}

		log::info!("Scanned {} files", snapshot.len());
		Ok(snapshot)
	}
}
