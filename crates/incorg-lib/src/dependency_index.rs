//! The include graph snapshot and the memoized expansion of files into their transitive includes.
//!
//! A [`DependencySource`] answers what a single file directly includes and how big it is.
//! [`DependencySnapshot`] is the in-memory implementation used by the terminal and tests,
//! [`DependencyIndex`] sits on top of any source and expands files into their closure and weight.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Mutex, RwLock};
use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

use crate::entry::FilePath;

/// Read access to a dependency snapshot.
pub trait DependencySource {
	/// Files directly included by `file`, empty for unknown files.
	fn direct_includes_of(&self, file: &FilePath) -> Vec<FilePath>;
	/// Size of `file` in bytes if the source has it.
	fn byte_size_of(&self, file: &FilePath) -> Option<u64>;
	/// Whether `file` was parsed into the snapshot.
	fn is_known(&self, file: &FilePath) -> bool;
	/// Changes whenever the graph changes. `0` marks an unversioned source.
	fn version(&self) -> u64 { 0 }
}

impl<T: DependencySource + ?Sized> DependencySource for &T {
	fn direct_includes_of(&self, file: &FilePath) -> Vec<FilePath> { (**self).direct_includes_of(file) }
	fn byte_size_of(&self, file: &FilePath) -> Option<u64> { (**self).byte_size_of(file) }
	fn is_known(&self, file: &FilePath) -> bool { (**self).is_known(file) }
	fn version(&self) -> u64 { (**self).version() }
}

impl<T: DependencySource + ?Sized> DependencySource for Arc<T> {
	fn direct_includes_of(&self, file: &FilePath) -> Vec<FilePath> { (**self).direct_includes_of(file) }
	fn byte_size_of(&self, file: &FilePath) -> Option<u64> { (**self).byte_size_of(file) }
	fn is_known(&self, file: &FilePath) -> bool { (**self).is_known(file) }
	fn version(&self) -> u64 { (**self).version() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileNode {
	/// File was read, carries its size in bytes.
	Parsed(FilePath, u64),
	/// File is only known as the target of an include.
	Stub(FilePath),
}

impl FileNode {
	pub fn path(&self) -> &FilePath {
		match self {
			FileNode::Parsed(path, _) | FileNode::Stub(path) => path,
		}
	}
}

/* Shared by every snapshot in the process so two different graphs never carry the same version */
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
	NEXT_VERSION.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Arena of files addressed by path, edges point from includer to included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencySnapshot {
	pub graph: StableDiGraph<FileNode, ()>,
	nodes: HashMap<FilePath, NodeIndex>,
	/// Not persisted, a loaded snapshot gets a fresh version.
	#[serde(skip)]
	version: u64,
}

impl DependencySnapshot {
	pub fn new() -> Self {
		Default::default()
	}

	/// Builds a snapshot from `(file, size, direct includes)` rows.
	///
	/// Every listed file is known to the snapshot, includes of unlisted files become stubs.
	pub fn from_includes(rows: &[(&str, u64, &[&str])]) -> Self {
		let mut snapshot = DependencySnapshot::new();
		for (file, size, includes) in rows {
			let file = FilePath::new(*file);
			snapshot.insert_file(file.clone(), *size);
			for include in *includes {
				snapshot.add_include(&file, FilePath::new(*include));
			}
		}
		snapshot
	}

	/// Records `path` as parsed with the given size, upgrading a stub if present.
	pub fn insert_file(&mut self, path: FilePath, size: u64) -> NodeIndex {
		self.version = next_version();
		if let Some(i) = self.node_index(&path) {
			self.graph[i] = FileNode::Parsed(path, size);
			i
		} else {
			let i = self.graph.add_node(FileNode::Parsed(path.clone(), size));
			self.nodes.insert(path, i);
			i
		}
	}

	/// Adds an edge `from -> to`, either side is created as a stub when missing.
	pub fn add_include(&mut self, from: &FilePath, to: FilePath) {
		self.version = next_version();
		let a = self.get_or_add_node_index(from);
		let b = self.get_or_add_node_index(&to);
		self.graph.update_edge(a, b, ());
	}

	pub fn node_index(&self, path: &FilePath) -> Option<NodeIndex> {
		self.nodes.get(path).copied()
	}

	/// Returns the index of the existing node or a new `Stub` node for `path`
	pub fn get_or_add_node_index(&mut self, path: &FilePath) -> NodeIndex {
		if let Some(i) = self.node_index(path) {
			return i;
		}
		let i = self.graph.add_node(FileNode::Stub(path.clone()));
		self.nodes.insert(path.clone(), i);
		i
	}

	pub fn files(&self) -> impl Iterator<Item = &FilePath> {
		self.graph.node_indices().map(move |i| self.graph[i].path())
	}

	pub fn len(&self) -> usize {
		self.graph.node_count()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}

	/// Loads a snapshot, `.json` files are read as JSON and anything else as bincode.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when opening or reading the file.
	/// - [`SerdeJSON`](crate::error::Error::SerdeJSON) or [`Bincode`](crate::error::Error::Bincode) when deserializing.
	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		let file = std::io::BufReader::new(std::fs::File::open(path)?);
		let mut snapshot: Self = if is_json(path) {
			serde_json::from_reader(file)?
		} else {
			bincode::deserialize_from(file)?
		};
		snapshot.version = next_version();
		Ok(snapshot)
	}

	/// Saves the snapshot using the same format rules as [`load_from_file()`](DependencySnapshot::load_from_file()).
	pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::io::BufWriter::new(std::fs::File::create(path)?);
		if is_json(path) {
			serde_json::to_writer(file, self)?;
		} else {
			bincode::serialize_into(file, self)?;
		}
		Ok(())
	}
}

fn is_json(path: &Path) -> bool {
	path.extension().map_or(false, |e| e.eq_ignore_ascii_case("json"))
}

impl DependencySource for DependencySnapshot {
	fn direct_includes_of(&self, file: &FilePath) -> Vec<FilePath> {
		let Some(i) = self.node_index(file) else { return Vec::new() };
		let mut includes: Vec<_> = self.graph
			.neighbors_directed(i, Outgoing)
			.map(|n| self.graph[n].path().clone())
			.collect();
		includes.sort();
		includes.dedup();
		includes
	}

	fn byte_size_of(&self, file: &FilePath) -> Option<u64> {
		match &self.graph[self.node_index(file)?] {
			FileNode::Parsed(_, size) => Some(*size),
			FileNode::Stub(_) => None,
		}
	}

	fn is_known(&self, file: &FilePath) -> bool {
		self.node_index(file).map_or(false, |i| matches!(self.graph[i], FileNode::Parsed(..)))
	}

	fn version(&self) -> u64 {
		self.version
	}
}

/// A file expanded into everything it pulls in.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Expansion {
	/// Size of the file itself.
	pub own_weight: u64,
	/// `own_weight` plus the own weight of every file in `closure`.
	pub weight: u64,
	/// Every file reachable through at least one include, never the file itself.
	pub closure: BTreeSet<FilePath>,
}

/// Own and transitive size of a single include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeWeight {
	pub file: FilePath,
	pub own: u64,
	pub total: u64,
}

impl std::fmt::Display for IncludeWeight {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} = {:.1}({:.1}) Kb", self.file, self.own as f64 / 1024., self.total as f64 / 1024.)
	}
}

/// Memoizing expansion of files over a [`DependencySource`].
///
/// Expansions are only ever added, and only once a whole region of the graph is finished,
/// so an index can be shared between threads and queried concurrently.
#[derive(Debug)]
pub struct DependencyIndex<S> {
	source: S,
	version: u64,
	expanded: RwLock<HashMap<FilePath, Arc<Expansion>>>,
	/// Held while a region is expanded so each file is computed once.
	expanding: Mutex<()>,
}

impl<S: DependencySource> DependencyIndex<S> {
	pub fn new(source: S) -> Self {
		let version = source.version();
		Self {
			source,
			version,
			expanded: Default::default(),
			expanding: Default::default(),
		}
	}

	pub fn source(&self) -> &S {
		&self.source
	}

	/// Version of the source when this index was created.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Number of files expanded so far.
	pub fn expanded_len(&self) -> usize {
		self.expanded.read().len()
	}

	/// Expands `file` into its transitive closure and weight.
	///
	/// Include cycles are tolerated, every member of a cycle reaches every other member.
	pub fn expand(&self, file: &FilePath) -> Arc<Expansion> {
		if let Some(done) = self.expanded.read().get(file) {
			return done.clone();
		}

		let _guard = self.expanding.lock();
		/* Another caller may have finished this file while we waited */
		if let Some(done) = self.expanded.read().get(file) {
			return done.clone();
		}

		let region = self.expand_region(file);
		log::trace!("Expanded {} files reachable from {}", region.len(), file);

		let mut expanded = self.expanded.write();
		for (path, expansion) in region {
			expanded.entry(path).or_insert(expansion);
		}
		expanded.get(file).cloned().unwrap_or_default()
	}

	pub fn weight(&self, file: &FilePath) -> u64 {
		self.expand(file).weight
	}

	/// A file can be given its own entry if the snapshot knows it or it exists on disk.
	pub fn is_resolvable(&self, file: &FilePath) -> bool {
		!file.is_empty() && (self.source.is_known(file) || file.as_path().is_file())
	}

	pub fn weight_report(&self, file: &FilePath) -> IncludeWeight {
		let expansion = self.expand(file);
		IncludeWeight { file: file.clone(), own: expansion.own_weight, total: expansion.weight }
	}

	fn own_weight(&self, file: &FilePath) -> u64 {
		if self.source.is_known(file) {
			if let Some(size) = self.source.byte_size_of(file) {
				return size;
			}
		}
		match std::fs::metadata(file.as_path()) {
			Ok(metadata) => metadata.len(),
			Err(e) => {
				log::trace!("No size available for {}: {}", file, e);
				0
			},
		}
	}

	/// Expands every file reachable from `root` that has not been expanded before.
	///
	/// The unexpanded part of the graph is condensed into strongly connected components,
	/// which `tarjan_scc` yields sinks first, so each component only needs the closures
	/// of components already processed.
	fn expand_region(&self, root: &FilePath) -> HashMap<FilePath, Arc<Expansion>> {
		let expanded = self.expanded.read();

		let mut region = DiGraph::<FilePath, ()>::new();
		let mut nodes = HashMap::<FilePath, NodeIndex>::new();
		/* Edges leaving the region into files that are already expanded */
		let mut boundary = HashMap::<NodeIndex, Vec<(FilePath, Arc<Expansion>)>>::new();
		let mut own_weights = HashMap::<FilePath, u64>::new();
		let mut queue = VecDeque::<NodeIndex>::new();

		let start = region.add_node(root.clone());
		nodes.insert(root.clone(), start);
		queue.push_back(start);

		while let Some(i) = queue.pop_front() {
			let file = region[i].clone();
			own_weights.insert(file.clone(), self.own_weight(&file));

			if !self.source.is_known(&file) {
				log::trace!("{} is not in the snapshot, treating it as a leaf", file);
				continue;
			}

			for child in self.source.direct_includes_of(&file) {
				if let Some(done) = expanded.get(&child) {
					boundary.entry(i).or_default().push((child, done.clone()));
					continue;
				}
				let c = match nodes.get(&child) {
					Some(c) => *c,
					None => {
						let c = region.add_node(child.clone());
						nodes.insert(child, c);
						queue.push_back(c);
						c
					},
				};
				region.update_edge(i, c, ());
			}
		}

		let components = petgraph::algo::tarjan_scc(&region);
		let mut component_of = HashMap::<NodeIndex, usize>::with_capacity(region.node_count());
		for (c, members) in components.iter().enumerate() {
			for m in members {
				component_of.insert(*m, c);
			}
		}

		let mut reachable = Vec::<BTreeSet<FilePath>>::with_capacity(components.len());
		for (c, members) in components.iter().enumerate() {
			let mut reach = BTreeSet::new();

			let is_cycle = members.len() > 1 || members.iter().any(|m| region.contains_edge(*m, *m));
			if is_cycle {
				reach.extend(members.iter().map(|m| region[*m].clone()));
			}

			for m in members {
				for next in region.neighbors(*m) {
					let nc = component_of[&next];
					if nc != c {
						reach.insert(region[next].clone());
						reach.extend(reachable[nc].iter().cloned());
					}
				}
				for (child, done) in boundary.get(m).into_iter().flatten() {
					reach.insert(child.clone());
					reach.extend(done.closure.iter().cloned());
				}
			}

			reachable.push(reach);
		}

		/* Every file in a closure is either in this region or already expanded */
		let own_weight_of = |file: &FilePath| -> u64 {
			own_weights.get(file).copied()
				.or_else(|| expanded.get(file).map(|e| e.own_weight))
				.unwrap_or(0)
		};

		region.node_indices()
			.map(|i| {
				let file = region[i].clone();
				let mut closure = reachable[component_of[&i]].clone();
				closure.remove(&file);
				let own_weight = own_weight_of(&file);
				let weight = closure.iter().fold(own_weight, |sum, f| sum.saturating_add(own_weight_of(f)));
				(file, Arc::new(Expansion { own_weight, weight, closure }))
			})
			.collect()
	}
}

/// Keeps one index alive for as long as the snapshot version it was built from.
#[derive(Debug)]
pub struct IndexCache<S> {
	current: Option<Arc<DependencyIndex<S>>>,
}

impl<S> Default for IndexCache<S> {
	fn default() -> Self {
		Self { current: None }
	}
}

impl<S: DependencySource> IndexCache<S> {
	pub fn new() -> Self {
		Default::default()
	}

	/// Returns the cached index when `source` has the same version, otherwise starts a new one.
	///
	/// Unversioned sources (version `0`) always get a fresh index.
	pub fn index_for(&mut self, source: S) -> Arc<DependencyIndex<S>> {
		let version = source.version();
		if let Some(index) = &self.current {
			if version != 0 && index.version() == version {
				log::debug!("Reusing dependency index for snapshot version {}", version);
				return index.clone();
			}
		}
		let index = Arc::new(DependencyIndex::new(source));
		self.current = Some(index.clone());
		index
	}
}
