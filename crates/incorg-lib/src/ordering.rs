//! Final order and blank line grouping of accepted entries.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};

use crate::entry::Entry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
	/// Project headers first, then other libraries, then system headers.
	#[default]
	SpecificFirst,
	/// Reverse of `SpecificFirst`.
	GeneralFirst,
	/// Leave entries where they are.
	KeepCurrent,
	Alphabetical,
}

static ORDER_NAMES: Lazy<HashMap<&'static str, Order>> = Lazy::new(|| {
	HashMap::from([
		("specificfirst", Order::SpecificFirst),
		("specific-first", Order::SpecificFirst),
		("specific", Order::SpecificFirst),
		("generalfirst", Order::GeneralFirst),
		("general-first", Order::GeneralFirst),
		("general", Order::GeneralFirst),
		("keepcurrent", Order::KeepCurrent),
		("keep-current", Order::KeepCurrent),
		("keep", Order::KeepCurrent),
		("alphabetical", Order::Alphabetical),
		("alpha", Order::Alphabetical),
	])
});

impl std::str::FromStr for Order {
	type Err = crate::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ORDER_NAMES.get(s.trim().to_ascii_lowercase().as_str())
			.copied()
			.ok_or_else(|| crate::Error::InvalidOrder(s.to_string()))
	}
}

impl std::fmt::Display for Order {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Order::SpecificFirst => write!(f, "specific-first"),
			Order::GeneralFirst => write!(f, "general-first"),
			Order::KeepCurrent => write!(f, "keep-current"),
			Order::Alphabetical => write!(f, "alphabetical"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
	Project,
	Other,
	System,
}

#[derive(Debug, Clone)]
pub struct OrderingPolicy {
	pub order: Order,
	pub project_root: PathBuf,
	pub system_root: PathBuf,
}

impl OrderingPolicy {
	pub fn new(order: Order, project_root: impl Into<PathBuf>, system_root: impl Into<PathBuf>) -> Self {
		Self { order, project_root: project_root.into(), system_root: system_root.into() }
	}

	/// Sorts `entries` and assigns their `group_index`.
	///
	/// The result only depends on the set of entries, not on the order they arrive in,
	/// except for [`Order::KeepCurrent`] which leaves them untouched.
	pub fn apply(&self, entries: &mut [Entry]) {
		match self.order {
			Order::KeepCurrent => {},
			Order::Alphabetical => {
				entries.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
				entries.iter_mut().for_each(|e| e.group_index = 0);
			},
			Order::SpecificFirst | Order::GeneralFirst => {
				entries.sort_by_cached_key(|e| (self.bucket(e), Reverse(e.sort_key().to_string())));
				if self.order == Order::GeneralFirst {
					entries.reverse();
				}
				assign_groups(entries);
			},
		}
	}

	fn bucket(&self, entry: &Entry) -> Bucket {
		if !entry.is_resolved() {
			return Bucket::Other;
		}
		let path = entry.resolved_file.as_path();
		if !self.project_root.as_os_str().is_empty() && path.starts_with(&self.project_root) {
			Bucket::Project
		} else if !self.system_root.as_os_str().is_empty() && path.starts_with(&self.system_root) {
			Bucket::System
		} else {
			Bucket::Other
		}
	}
}

fn group_dir(entry: &Entry) -> &Path {
	let path = Path::new(entry.sort_key());
	path.parent().unwrap_or(path)
}

/// Bare spellings have no directory, they only relate to each other.
fn is_related(a: &Path, b: &Path) -> bool {
	let (a_bare, b_bare) = (a.as_os_str().is_empty(), b.as_os_str().is_empty());
	if a_bare || b_bare {
		return a_bare && b_bare;
	}
	a.starts_with(b) || b.starts_with(a)
}

/// Starts a new group whenever a directory is unrelated to the one before it.
fn assign_groups(entries: &mut [Entry]) {
	let mut group = 0;
	let mut previous: Option<PathBuf> = None;
	for entry in entries.iter_mut() {
		let dir = group_dir(entry).to_path_buf();
		if let Some(prev) = &previous {
			if !is_related(&dir, prev) {
				group += 1;
			}
		}
		entry.group_index = group;
		previous = Some(dir);
	}
}
