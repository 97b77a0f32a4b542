use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid regex \"{pattern}\": {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid path segment \"{segment}\" in \"{path}\"")]
    InvalidPath { path: String, segment: String },

    #[error(transparent)]
    Repository(#[from] boothdb_core::RepositoryError),

    #[error(transparent)]
    Agent(#[from] boothdb_core::AgentError),
}
