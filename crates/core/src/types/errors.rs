//! Error types for card definition resolution.

use thiserror::Error;

use crate::loader::FetchError;

/// Errors raised while building a card definition.
///
/// These never abort an indexing run: the affected definition is skipped and
/// instances adopting from it are recorded as errors.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The card's ancestry loops back on itself.
    #[error("circular ancestry through {0}")]
    Circular(String),

    /// An import names an export the module does not have.
    #[error("module {module} has no card exported as '{name}'")]
    MissingExport { module: String, name: String },

    /// An in-realm module was not found during the walk.
    #[error("module {0} is not part of the index")]
    MissingModule(String),

    /// An in-realm module exists but could not be analyzed.
    #[error("module {module} could not be analyzed: {message}")]
    BrokenModule { module: String, message: String },

    /// A specifier that resolves to no URL.
    #[error("cannot resolve module specifier '{0}'")]
    UnresolvableModule(String),

    /// A class referenced as a card that extends nothing.
    #[error("class '{name}' in {module} does not extend a card")]
    NotACard { module: String, name: String },

    /// A module outside every realm this index knows about.
    #[error("no known realm serves {0}")]
    UnknownRealm(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The owning realm answered a type lookup with a failure status.
    #[error("type lookup {url} returned status {status}")]
    TypeLookup { url: String, status: u16 },

    /// The owning realm answered with something that is not a definition.
    #[error("invalid card definition from {url}: {source}")]
    InvalidDefinition {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
