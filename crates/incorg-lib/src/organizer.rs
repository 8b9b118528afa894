//! One organize pass over a document's include block.
//!
//! # Usage
//! 1. Get a [`DependencyIndex`] for the current snapshot, see [`IndexCache`](crate::dependency_index::IndexCache).
//! 1. Create an [`Organizer`] with the index and [`Settings`].
//! 1. Describe the document with an [`OrganizeRequest`].
//! 1. [`Organizer::organize()`] or [`organize_in_background()`] to get an [`OrganizeResult`] to render.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Serialize, Deserialize};

use crate::config::Settings;
use crate::coverage_map::CoverageMap;
use crate::dependency_index::{DependencyIndex, DependencySource};
use crate::entry::{Entry, FilePath};
use crate::ordering::{Order, OrderingPolicy};
use crate::resolution;
use crate::set_cover::SetCoverReducer;

/// Which parts of a pass are allowed to change the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actions {
	/// Reorder and regroup entries.
	pub sort: bool,
	/// Add entries for required files nothing covers.
	pub add: bool,
	/// Drop redundant and duplicate entries.
	pub remove: bool,
	/// Search the disk for unresolved entries.
	pub resolve: bool,
	/// Recompute every spelling, not only missing ones.
	pub rename: bool,
}

impl Actions {
	pub fn all() -> Self {
		Self { sort: true, add: true, remove: true, resolve: true, rename: true }
	}

	pub fn none() -> Self {
		Self { sort: false, add: false, remove: false, resolve: false, rename: false }
	}
}

impl Default for Actions {
	fn default() -> Self {
		Self::all()
	}
}

impl std::str::FromStr for Actions {
	type Err = crate::Error;

	/// Comma separated action names, or `all`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut actions = Actions::none();
		for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
			match name.to_ascii_lowercase().as_str() {
				"all" => actions = Actions::all(),
				"sort" => actions.sort = true,
				"add" => actions.add = true,
				"remove" => actions.remove = true,
				"resolve" => actions.resolve = true,
				"rename" => actions.rename = true,
				_ => return Err(crate::Error::Parse(format!("unknown organize action `{}`", name))),
			}
		}
		Ok(actions)
	}
}

/// The document under analysis as handed over by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeRequest {
	pub document: FilePath,
	pub project_root: PathBuf,
	pub search_roots: Vec<PathBuf>,
	/// Current entries in document order.
	pub entries: Vec<Entry>,
	/// Files declaring something the document uses.
	pub required: Vec<FilePath>,
}

impl OrganizeRequest {
	pub fn load_from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		Ok(serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(path)?))?)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeResult {
	/// Entries to render in order.
	pub entries: Vec<Entry>,
	/// Entries removed from the document.
	pub dropped: Vec<Entry>,
	/// Entries kept as they are because their file could not be found.
	pub unresolved: Vec<Entry>,
	/// Required files no entry can provide.
	pub uncoverable: Vec<FilePath>,
}

impl OrganizeResult {
	pub fn render(&self) -> String {
		crate::entry::render_block(&self.entries)
	}

	pub fn added(&self) -> impl Iterator<Item = &Entry> {
		self.entries.iter().filter(|e| e.is_new)
	}
}

#[derive(Debug)]
pub struct Organizer<S> {
	index: Arc<DependencyIndex<S>>,
	settings: Settings,
}

impl<S: DependencySource> Organizer<S> {
	pub fn new(index: Arc<DependencyIndex<S>>, settings: Settings) -> Self {
		Self { index, settings }
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn index(&self) -> &Arc<DependencyIndex<S>> {
		&self.index
	}

	/// Runs a pass with the actions from the settings.
	pub fn organize(&self, request: &OrganizeRequest) -> OrganizeResult {
		self.organize_with(request, self.settings.organize_actions)
	}

	pub fn organize_with(&self, request: &OrganizeRequest, actions: Actions) -> OrganizeResult {
		let index: &DependencyIndex<S> = &self.index;
		let mut result = OrganizeResult::default();
		let roots = spelling_roots(request);

		let mut entries = request.entries.clone();
		if actions.resolve && self.settings.search_unresolved {
			for entry in entries.iter_mut().filter(|e| !e.is_resolved() && !e.is_moc() && !e.spelling.is_empty()) {
				if let Some(file) = resolution::resolve(&entry.spelling, &roots) {
					entry.resolved_file = file;
				}
			}
		}

		/* Generated and unresolved entries stay as they are */
		let (moc, entries): (Vec<Entry>, Vec<Entry>) = entries.into_iter().partition(Entry::is_moc);
		let (unresolved, entries): (Vec<Entry>, Vec<Entry>) = entries.into_iter().partition(|e| !e.is_resolved());
		for entry in &unresolved {
			log::info!("Unresolved include {}", entry.spelling);
		}
		result.unresolved = unresolved.clone();

		let mut entries = entries;
		if self.settings.prefer_public_headers {
			for entry in entries.iter_mut() {
				if let Some(public) = resolution::prefer_public_header(&entry.resolved_file) {
					log::debug!("Using {} instead of {}", public, entry.resolved_file);
					entry.resolved_file = public;
					entry.spelling.clear();
				}
			}
		}

		if actions.remove {
			let mut seen = HashSet::new();
			let (kept, duplicates): (Vec<Entry>, Vec<Entry>) = entries.into_iter().partition(|e| seen.insert(e.resolved_file.clone()));
			entries = kept;
			result.dropped.extend(duplicates);
		}

		let mut uncoverable = BTreeSet::new();
		let mut required = BTreeSet::new();
		for file in request.required.iter().filter(|f| !f.is_empty()) {
			let file = if self.settings.prefer_public_headers {
				resolution::prefer_public_header(file).unwrap_or_else(|| file.clone())
			} else {
				file.clone()
			};
			if file == request.document {
				uncoverable.insert(file);
			} else {
				required.insert(file);
			}
		}

		let mut map = CoverageMap::build(&entries, required, index);
		let reduction = SetCoverReducer::new(index, self.settings.policy).reduce(&mut map);
		uncoverable.extend(reduction.uncoverable);
		result.uncoverable = uncoverable.into_iter().collect();

		if actions.remove {
			let (dropped, kept): (Vec<Entry>, Vec<Entry>) = entries.into_iter()
				.partition(|e| reduction.entries_to_drop.contains(&e.resolved_file));
			entries = kept;
			result.dropped.extend(dropped);
		}
		if actions.add {
			entries.extend(reduction.files_needing_new_entry.iter().cloned().map(Entry::synthesized));
		}

		for entry in entries.iter_mut() {
			if !request.project_root.as_os_str().is_empty() {
				entry.is_local = resolution::is_local(&entry.resolved_file, &request.project_root);
			}
			if actions.rename || entry.spelling.is_empty() {
				entry.spelling = resolution::shortest_spelling(&entry.resolved_file, &roots);
			}
		}

		let order = if actions.sort { self.settings.order } else { Order::KeepCurrent };
		if order == Order::KeepCurrent {
			/* Unresolved entries go back to their line, new entries form a group after everything else */
			let (added, mut existing): (Vec<Entry>, Vec<Entry>) = entries.into_iter().chain(unresolved).partition(|e| e.is_new);
			existing.sort_by_key(|e| e.source_line.unwrap_or(usize::MAX));
			let next_group = existing.iter().map(|e| e.group_index + 1).max().unwrap_or(0);
			entries = existing;
			entries.extend(added.into_iter().map(|mut e| { e.group_index = next_group; e }));
		} else {
			entries.extend(unresolved);
		}
		OrderingPolicy::new(order, &request.project_root, &self.settings.system_root).apply(&mut entries);

		let last_group = entries.last().map_or(0, |e| e.group_index + 1);
		entries.extend(moc.into_iter().map(|mut e| { e.group_index = last_group; e }));
		result.entries = entries;

		log::info!(
			"Organized {}: {} entries, {} added, {} dropped, {} unresolved, {} uncoverable",
			request.document,
			result.entries.len(),
			result.added().count(),
			result.dropped.len(),
			result.unresolved.len(),
			result.uncoverable.len()
		);
		result
	}
}

/// Roots spellings are computed against, the document's own directory included.
fn spelling_roots(request: &OrganizeRequest) -> Vec<PathBuf> {
	let mut roots: Vec<PathBuf> = request.search_roots.iter()
		.map(|r| std::fs::canonicalize(r).unwrap_or_else(|_| r.clone()))
		.collect();
	let dir = request.document.parent_dir();
	if !dir.as_os_str().is_empty() {
		roots.push(dir.to_path_buf());
	}
	roots
}

/// Runs one pass on the blocking thread pool, dropping the future abandons the result.
pub async fn organize_in_background<S>(organizer: Arc<Organizer<S>>, request: OrganizeRequest) -> crate::Result<OrganizeResult>
where
	S: DependencySource + Send + Sync + 'static,
{
	Ok(tokio::task::spawn_blocking(move || organizer.organize(&request)).await?)
}
