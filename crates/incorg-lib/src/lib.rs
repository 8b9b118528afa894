pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::Config;
pub use config::Settings;

pub mod entry;
pub use entry::Entry;
pub use entry::FilePath;

pub mod dependency_index;
pub use dependency_index::DependencyIndex;
pub use dependency_index::DependencySnapshot;
pub use dependency_index::DependencySource;
pub use dependency_index::IndexCache;

mod scan;

pub mod coverage_map;
pub use coverage_map::CoverageMap;

pub mod set_cover;
pub use set_cover::Policy;
pub use set_cover::Reduction;
pub use set_cover::SetCoverReducer;

pub mod ordering;
pub use ordering::Order;
pub use ordering::OrderingPolicy;

pub mod resolution;

pub mod organizer;
pub use organizer::Organizer;
pub use organizer::OrganizeRequest;
pub use organizer::OrganizeResult;
pub use organizer::Actions;
pub use organizer::organize_in_background;
