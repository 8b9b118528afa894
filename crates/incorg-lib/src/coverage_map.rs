//! Bipartite relation between include entries and the required files they reach.
//!
//! Entries are keyed by their resolved file. Both directions of the relation are updated
//! together by every mutation, so for any entry `e` and required file `r`,
//! `r ∈ coverage_of(e)` exactly when `e ∈ covered_by(r)`.

use std::collections::{BTreeMap, BTreeSet};

use crate::dependency_index::{DependencyIndex, DependencySource};
use crate::entry::{Entry, FilePath};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
	coverage_of: BTreeMap<FilePath, BTreeSet<FilePath>>,
	covered_by: BTreeMap<FilePath, BTreeSet<FilePath>>,
	required: BTreeSet<FilePath>,
}

impl CoverageMap {
	/// Builds the map for every resolved candidate, unresolved candidates are skipped.
	pub fn build<S: DependencySource>(candidates: &[Entry], required: impl IntoIterator<Item = FilePath>, index: &DependencyIndex<S>) -> Self {
		let mut map = CoverageMap {
			required: required.into_iter().filter(|r| !r.is_empty()).collect(),
			..Default::default()
		};
		for candidate in candidates.iter().filter(|c| c.is_resolved()) {
			map.add_entry(index, &candidate.resolved_file);
		}
		log::debug!("Coverage map built with {} entries over {} required files", map.coverage_of.len(), map.required.len());
		map
	}

	/// Required files reachable from `file`, counting `file` itself.
	pub fn coverage_for<S: DependencySource>(index: &DependencyIndex<S>, file: &FilePath, required: &BTreeSet<FilePath>) -> BTreeSet<FilePath> {
		let expansion = index.expand(file);
		let mut coverage: BTreeSet<FilePath> = expansion.closure.intersection(required).cloned().collect();
		if required.contains(file) {
			coverage.insert(file.clone());
		}
		coverage
	}

	/// Adds `file` as an entry, does nothing if it is already one.
	pub fn add_entry<S: DependencySource>(&mut self, index: &DependencyIndex<S>, file: &FilePath) {
		if self.coverage_of.contains_key(file) {
			return;
		}
		let coverage = Self::coverage_for(index, file, &self.required);
		for r in &coverage {
			self.covered_by.entry(r.clone()).or_default().insert(file.clone());
		}
		log::trace!("{} covers {} required files", file, coverage.len());
		self.coverage_of.insert(file.clone(), coverage);
	}

	/// Removes an entry, returns the required files it left without any coverer.
	pub fn remove_entry(&mut self, file: &FilePath) -> Vec<FilePath> {
		self.remove_entries(std::iter::once(file.clone()))
	}

	/// Removes every entry in `files` and only then collects the required files left
	/// without a coverer, so the outcome does not depend on the order of `files`.
	pub fn remove_entries(&mut self, files: impl IntoIterator<Item = FilePath>) -> Vec<FilePath> {
		let removals: BTreeSet<FilePath> = files.into_iter()
			.filter(|f| self.coverage_of.contains_key(f))
			.collect();

		let mut touched = BTreeSet::new();
		for file in &removals {
			for r in self.coverage_of.remove(file).unwrap_or_default() {
				if let Some(coverers) = self.covered_by.get_mut(&r) {
					coverers.remove(file);
				}
				touched.insert(r);
			}
		}

		let mut uncovered = Vec::new();
		for r in touched {
			if self.covered_by.get(&r).map_or(true, BTreeSet::is_empty) {
				self.covered_by.remove(&r);
				uncovered.push(r);
			}
		}
		uncovered
	}

	/// Drops `file` from the required set and from every entry's coverage.
	pub fn forget_required(&mut self, file: &FilePath) {
		self.required.remove(file);
		for coverer in self.covered_by.remove(file).unwrap_or_default() {
			if let Some(coverage) = self.coverage_of.get_mut(&coverer) {
				coverage.remove(file);
			}
		}
	}

	/// Required files that no entry covers.
	pub fn required_with_no_candidate_coverage(&self) -> BTreeSet<FilePath> {
		self.required.iter()
			.filter(|r| !self.covered_by.contains_key(*r))
			.cloned()
			.collect()
	}

	/// Entries that are the only coverer of at least one required file.
	pub fn exclusively_covered_entries(&self) -> BTreeSet<FilePath> {
		self.covered_by.values()
			.filter(|coverers| coverers.len() == 1)
			.flatten()
			.cloned()
			.collect()
	}

	pub fn coverage_of(&self, file: &FilePath) -> Option<&BTreeSet<FilePath>> {
		self.coverage_of.get(file)
	}

	pub fn covered_by(&self, required: &FilePath) -> Option<&BTreeSet<FilePath>> {
		self.covered_by.get(required)
	}

	pub fn contains_entry(&self, file: &FilePath) -> bool {
		self.coverage_of.contains_key(file)
	}

	pub fn entries(&self) -> impl Iterator<Item = &FilePath> {
		self.coverage_of.keys()
	}

	pub fn required(&self) -> &BTreeSet<FilePath> {
		&self.required
	}

	/// True when every required file has a coverer.
	pub fn is_sound(&self) -> bool {
		self.required.iter().all(|r| self.covered_by.contains_key(r))
	}
}
