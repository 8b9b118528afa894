//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("bincode error: {0}")]
	Bincode(#[from] bincode::Error),
	#[error("error walking directory: {0}")]
	WalkDir(#[from] walkdir::Error),
	#[error("parsing error: {0}")]
	Parse(String),
	#[error("unknown coverage policy `{0}`")]
	InvalidPolicy(String),
	#[error("unknown include order `{0}`")]
	InvalidOrder(String),
	#[error("background organize task failed: {0}")]
	Background(#[from] tokio::task::JoinError),
}
