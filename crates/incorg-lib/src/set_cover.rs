//! Chooses which include entries to keep and which files need a new entry.
//!
//! # Usage
//! 1. Build a [`CoverageMap`] over the current entries and the required files.
//! 1. Create a [`SetCoverReducer`] with a [`Policy`].
//! 1. [`SetCoverReducer::reduce()`] the map, which is left holding exactly the accepted entries.
//! 1. Apply the returned [`Reduction`] to the document's entries.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};

use crate::coverage_map::CoverageMap;
use crate::dependency_index::{DependencyIndex, DependencySource};
use crate::entry::FilePath;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
	/// Fewest include lines that still cover every required file.
	#[default]
	MinimalEntries,
	/// One direct include per required file.
	MinimalDepth,
}

static POLICY_NAMES: Lazy<HashMap<&'static str, Policy>> = Lazy::new(|| {
	HashMap::from([
		("minimalentries", Policy::MinimalEntries),
		("minimal-entries", Policy::MinimalEntries),
		("entries", Policy::MinimalEntries),
		("minimaldepth", Policy::MinimalDepth),
		("minimal-depth", Policy::MinimalDepth),
		("depth", Policy::MinimalDepth),
	])
});

impl std::str::FromStr for Policy {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		POLICY_NAMES.get(s.trim().to_ascii_lowercase().as_str())
			.copied()
			.ok_or_else(|| crate::Error::InvalidPolicy(s.to_string()))
	}
}

impl std::fmt::Display for Policy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Policy::MinimalEntries => write!(f, "minimal-entries"),
			Policy::MinimalDepth => write!(f, "minimal-depth"),
		}
	}
}

/// Outcome of a reduction, keyed by resolved file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
	pub entries_to_drop: BTreeSet<FilePath>,
	pub files_needing_new_entry: BTreeSet<FilePath>,
	/// Required files nothing can cover, left out of the computation.
	pub uncoverable: BTreeSet<FilePath>,
}

#[derive(Debug)]
pub struct SetCoverReducer<'a, S> {
	index: &'a DependencyIndex<S>,
	policy: Policy,
}

impl<'a, S: DependencySource> SetCoverReducer<'a, S> {
	pub fn new(index: &'a DependencyIndex<S>, policy: Policy) -> Self {
		Self { index, policy }
	}

	pub fn policy(&self) -> Policy {
		self.policy
	}

	/// Reduces `map` in place to the accepted entries and reports the difference.
	///
	/// Afterwards every required file not reported as uncoverable is covered by an entry of `map`.
	pub fn reduce(&self, map: &mut CoverageMap) -> Reduction {
		let mut reduction = Reduction::default();

		for r in map.required_with_no_candidate_coverage() {
			if !self.index.is_resolvable(&r) {
				log::debug!("{} has no coverer and cannot be included directly", r);
				map.forget_required(&r);
				reduction.uncoverable.insert(r);
			}
		}

		let accepted = match self.policy {
			Policy::MinimalEntries => self.minimal_entries(map),
			Policy::MinimalDepth => self.minimal_depth(map),
		};

		reduction.entries_to_drop = map.entries().filter(|e| !accepted.contains(*e)).cloned().collect();
		reduction.files_needing_new_entry = accepted.into_iter().filter(|f| !map.contains_entry(f)).collect();

		for file in &reduction.files_needing_new_entry {
			map.add_entry(self.index, file);
		}
		for r in map.remove_entries(reduction.entries_to_drop.iter().cloned()) {
			log::warn!("{} lost its last coverer during reduction, giving it a direct entry", r);
			if !reduction.entries_to_drop.remove(&r) {
				reduction.files_needing_new_entry.insert(r.clone());
			}
			map.add_entry(self.index, &r);
		}

		log::debug!(
			"Reduced with {}: {} dropped, {} added, {} uncoverable",
			self.policy,
			reduction.entries_to_drop.len(),
			reduction.files_needing_new_entry.len(),
			reduction.uncoverable.len()
		);
		reduction
	}

	/// Greedy weighted set cover over the current entries and direct entries for required files.
	fn minimal_entries(&self, map: &CoverageMap) -> BTreeSet<FilePath> {
		let required = map.required();

		let mut universe: BTreeMap<FilePath, BTreeSet<FilePath>> = map.entries()
			.map(|e| (e.clone(), map.coverage_of(e).cloned().unwrap_or_default()))
			.collect();
		for r in required {
			if !universe.contains_key(r) && self.index.is_resolvable(r) {
				universe.insert(r.clone(), CoverageMap::coverage_for(self.index, r, required));
			}
		}

		let mut coverers = BTreeMap::<&FilePath, BTreeSet<&FilePath>>::new();
		for (coverer, coverage) in &universe {
			for r in coverage {
				coverers.entry(r).or_default().insert(coverer);
			}
		}

		let seeds = map.exclusively_covered_entries();
		let mut selected: BTreeSet<FilePath> = seeds.clone();
		let mut uncovered: BTreeSet<&FilePath> = coverers.keys().copied().collect();
		for s in &selected {
			for r in &universe[s] {
				uncovered.remove(r);
			}
		}

		while !uncovered.is_empty() {
			/* A file with a single possible coverer leaves no choice */
			let forced = uncovered.iter()
				.filter_map(|r| coverers.get(r))
				.find(|c| c.len() == 1)
				.and_then(|c| c.iter().next())
				.map(|c| (*c).clone());

			let choice = match forced {
				Some(c) => c,
				None => {
					let best = universe.iter()
						.filter(|(f, _)| !selected.contains(*f))
						.map(|(f, coverage)| (coverage.iter().filter(|r| uncovered.contains(r)).count(), f))
						.filter(|(n, _)| *n > 0)
						.min_by_key(|(n, f)| (Reverse(*n), self.index.weight(f), !map.contains_entry(f), (*f).clone()));
					match best {
						Some((_, f)) => f.clone(),
						None => {
							log::warn!("{} required files have no remaining coverer", uncovered.len());
							break;
						},
					}
				},
			};

			log::trace!("Selected {} for {} uncovered files", choice, universe[&choice].iter().filter(|r| uncovered.contains(r)).count());
			for r in &universe[&choice] {
				uncovered.remove(r);
			}
			selected.insert(choice);
		}

		/* Irredundancy, later additions and heavy headers are the first to go */
		let mut order: Vec<FilePath> = selected.iter().cloned().collect();
		order.sort_by_cached_key(|f| (seeds.contains(f), Reverse(self.index.weight(f)), f.clone()));
		for f in order {
			let redundant = universe[&f].iter().all(|r| {
				selected.iter().any(|other| other != &f && universe[other].contains(r))
			});
			if redundant {
				log::trace!("Dropping redundant selection {}", f);
				selected.remove(&f);
			}
		}

		selected
	}

	/// Every coverable required file becomes its own entry.
	fn minimal_depth(&self, map: &CoverageMap) -> BTreeSet<FilePath> {
		let mut accepted = BTreeSet::new();
		for r in map.required() {
			if map.contains_entry(r) || self.index.is_resolvable(r) {
				accepted.insert(r.clone());
				continue;
			}
			/* Cannot be included directly, keep its lightest current coverer */
			let lightest = map.covered_by(r)
				.and_then(|c| c.iter().min_by_key(|e| (self.index.weight(e), (*e).clone())));
			if let Some(coverer) = lightest {
				accepted.insert(coverer.clone());
			}
		}
		accepted
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::dependency_index::DependencySnapshot;
	use crate::entry::Entry;

	fn path(s: &str) -> FilePath { FilePath::new(s) }
	fn set(files: &[&str]) -> BTreeSet<FilePath> { files.iter().map(|f| path(f)).collect() }
	fn entries(files: &[&str]) -> Vec<Entry> { files.iter().map(|f| Entry::new_resolved(*f, "", None, true)).collect() }

	fn is_minimal(map: &CoverageMap) -> bool {
		let exclusive = map.exclusively_covered_entries();
		map.entries().all(|e| exclusive.contains(e))
	}

	fn containers() -> DependencyIndex<DependencySnapshot> {
		DependencyIndex::new(DependencySnapshot::from_includes(&[
			("/Containers.h", 32, &["/Vector.h", "/String.h"]),
			("/Vector.h", 10, &[]),
			("/String.h", 8, &[]),
		]))
	}

	fn overlapping() -> DependencyIndex<DependencySnapshot> {
		DependencyIndex::new(DependencySnapshot::from_includes(&[
			("/A.h", 1, &["/X.h", "/Y.h"]),
			("/B.h", 1, &["/Y.h"]),
			("/X.h", 1, &[]),
			("/Y.h", 1, &[]),
		]))
	}

	#[test] fn policy_parses_names() { assert_eq!("minimal-depth".parse::<Policy>().unwrap(), Policy::MinimalDepth) }
	#[test] fn policy_parse_ignores_case() { assert_eq!("MinimalEntries".parse::<Policy>().unwrap(), Policy::MinimalEntries) }
	#[test] fn policy_rejects_unknown_name() { assert!(matches!("fastest".parse::<Policy>(), Err(crate::Error::InvalidPolicy(_)))) }

	#[test]
	fn minimal_entries_prefers_one_umbrella_header() {
		let index = containers();
		let mut map = CoverageMap::build(&entries(&["/Containers.h"]), [path("/Vector.h"), path("/String.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert!(reduction.entries_to_drop.is_empty());
		assert!(reduction.files_needing_new_entry.is_empty());
		assert_eq!(map.entries().cloned().collect::<BTreeSet<_>>(), set(&["/Containers.h"]));
	}

	#[test]
	fn minimal_depth_includes_each_file_directly() {
		let index = containers();
		let mut map = CoverageMap::build(&entries(&["/Containers.h"]), [path("/Vector.h"), path("/String.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalDepth).reduce(&mut map);
		assert_eq!(reduction.entries_to_drop, set(&["/Containers.h"]));
		assert_eq!(reduction.files_needing_new_entry, set(&["/String.h", "/Vector.h"]));
		assert!(map.is_sound());
	}

	#[test]
	fn minimal_entries_drops_nested_entry() {
		let index = overlapping();
		let mut map = CoverageMap::build(&entries(&["/A.h", "/B.h"]), [path("/X.h"), path("/Y.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(reduction.entries_to_drop, set(&["/B.h"]));
		assert!(reduction.files_needing_new_entry.is_empty());
	}

	#[test]
	fn minimal_entries_without_candidates_adds_direct_entries() {
		let index = containers();
		let mut map = CoverageMap::build(&[], [path("/Vector.h"), path("/String.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(reduction.files_needing_new_entry, set(&["/String.h", "/Vector.h"]));
	}

	#[test]
	fn exclusive_coverers_make_broad_entry_redundant() {
		let index = DependencyIndex::new(DependencySnapshot::from_includes(&[
			("/A.h", 1, &["/x1.h", "/x2.h", "/x3.h", "/x4.h"]),
			("/B.h", 1, &["/x1.h", "/x2.h", "/x5.h"]),
			("/C.h", 1, &["/x3.h", "/x4.h", "/x6.h"]),
			("/x1.h", 1, &[]), ("/x2.h", 1, &[]), ("/x3.h", 1, &[]),
			("/x4.h", 1, &[]), ("/x5.h", 1, &[]), ("/x6.h", 1, &[]),
		]));
		let required = ["/x1.h", "/x2.h", "/x3.h", "/x4.h", "/x5.h", "/x6.h"].map(path);
		let mut map = CoverageMap::build(&entries(&["/A.h", "/B.h", "/C.h"]), required, &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(reduction.entries_to_drop, set(&["/A.h"]));
		assert!(is_minimal(&map));
	}

	#[test]
	fn minimal_entries_result_is_minimal() {
		let index = DependencyIndex::new(DependencySnapshot::from_includes(&[
			("/big.h", 100, &["/a.h", "/b.h", "/c.h"]),
			("/ab.h", 5, &["/a.h", "/b.h"]),
			("/bc.h", 5, &["/b.h", "/c.h"]),
			("/a.h", 1, &[]), ("/b.h", 1, &[]), ("/c.h", 1, &["/d.h"]), ("/d.h", 1, &[]),
		]));
		let required = ["/a.h", "/b.h", "/c.h", "/d.h"].map(path);
		let mut map = CoverageMap::build(&entries(&["/ab.h", "/bc.h", "/big.h", "/c.h"]), required, &index);
		SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert!(map.is_sound());
		assert!(is_minimal(&map));
	}

	#[test]
	fn greedy_ties_prefer_lighter_header() {
		let index = DependencyIndex::new(DependencySnapshot::from_includes(&[
			("/heavy.h", 500, &["/x.h", "/z.h", "/extra.h"]),
			("/light.h", 5, &["/x.h", "/z.h"]),
			("/x.h", 1, &[]),
			("/z.h", 1, &[]),
			("/extra.h", 1000, &[]),
		]));
		let mut map = CoverageMap::build(&entries(&["/heavy.h", "/light.h"]), [path("/x.h"), path("/z.h")], &index);
		SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(map.entries().cloned().collect::<BTreeSet<_>>(), set(&["/light.h"]));
	}

	#[test]
	fn unresolvable_required_is_uncoverable() {
		let index = containers();
		let mut map = CoverageMap::build(&entries(&["/Containers.h"]), [path("/Vector.h"), path("/nowhere/gone.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(reduction.uncoverable, set(&["/nowhere/gone.h"]));
		assert!(map.is_sound());
	}

	#[test]
	fn minimal_depth_keeps_coverer_of_unresolvable_file() {
		let index = DependencyIndex::new(DependencySnapshot::from_includes(&[("/a.h", 1, &["/nowhere/stub.h"])]));
		let mut map = CoverageMap::build(&entries(&["/a.h"]), [path("/nowhere/stub.h")], &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalDepth).reduce(&mut map);
		assert!(reduction.entries_to_drop.is_empty());
		assert!(reduction.uncoverable.is_empty());
	}

	#[test]
	fn minimal_depth_is_idempotent() {
		let index = containers();
		let required = [path("/Vector.h"), path("/String.h")];
		let mut map = CoverageMap::build(&entries(&["/Containers.h"]), required.clone(), &index);
		let reducer = SetCoverReducer::new(&index, Policy::MinimalDepth);
		reducer.reduce(&mut map);

		let accepted: Vec<Entry> = map.entries().map(|e| Entry::new_resolved(e.clone(), "", None, true)).collect();
		let mut again = CoverageMap::build(&accepted, required, &index);
		assert_eq!(reducer.reduce(&mut again), Reduction::default());
		assert_eq!(map, again);
	}

	#[test]
	fn empty_required_drops_everything() {
		let index = overlapping();
		let mut map = CoverageMap::build(&entries(&["/A.h", "/B.h"]), Vec::new(), &index);
		let reduction = SetCoverReducer::new(&index, Policy::MinimalEntries).reduce(&mut map);
		assert_eq!(reduction.entries_to_drop, set(&["/A.h", "/B.h"]));
		assert_eq!(map.entries().count(), 0);
	}

	#[test]
	fn sole_universe_coverer_survives_both_policies() {
		let index = DependencyIndex::new(DependencySnapshot::from_includes(&[("/only.h", 1, &["/nowhere/inner.h"]), ("/other.h", 1, &[])]));
		for policy in [Policy::MinimalEntries, Policy::MinimalDepth] {
			let mut map = CoverageMap::build(&entries(&["/only.h", "/other.h"]), [path("/nowhere/inner.h")], &index);
			SetCoverReducer::new(&index, policy).reduce(&mut map);
			assert!(map.contains_entry(&path("/only.h")));
		}
	}
}
