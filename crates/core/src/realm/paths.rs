//! Mapping between realm URLs and realm-relative paths.

use thiserror::Error;
use url::Url;

/// File extensions that mark a file as an executable (type-bearing) module.
pub const EXECUTABLE_EXTENSIONS: &[&str] = &[".js", ".gjs", ".ts", ".gts"];

/// Extension of structured instance documents.
pub const INSTANCE_EXTENSION: &str = ".json";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("realm URL must be absolute and end with '/': {0}")]
    InvalidRealmUrl(String),

    #[error("{url} is not within realm {realm}")]
    NotInRealm { url: String, realm: String },

    #[error("path of {0} is not valid UTF-8 once decoded")]
    Encoding(String),

    #[error("cannot build a URL for '{0}': {1}")]
    Join(String, #[source] url::ParseError),
}

/// Address arithmetic for one realm.
///
/// Local paths are realm-relative, never start with `/`, and never end with
/// `/`. The realm root itself is the empty local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmPaths {
    url: Url,
}

impl RealmPaths {
    pub fn new(url: Url) -> Result<Self, PathError> {
        if url.cannot_be_a_base() || !url.path().ends_with('/') {
            return Err(PathError::InvalidRealmUrl(url.to_string()));
        }
        Ok(Self { url })
    }

    /// Parse and validate a realm URL.
    pub fn parse(url: &str) -> Result<Self, PathError> {
        let url = Url::parse(url).map_err(|e| PathError::Join(url.to_string(), e))?;
        Self::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn in_realm(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.url.as_str())
    }

    /// Realm-relative path for a URL inside the realm, percent-decoded so it
    /// names the file as the reader sees it.
    pub fn local(&self, url: &Url) -> Result<String, PathError> {
        let rest = url.as_str().strip_prefix(self.url.as_str()).ok_or_else(|| {
            PathError::NotInRealm { url: url.to_string(), realm: self.url.to_string() }
        })?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let decoded =
            urlencoding::decode(rest).map_err(|_| PathError::Encoding(url.to_string()))?;
        Ok(decoded.trim_matches('/').to_string())
    }

    pub fn file_url(&self, local: &str) -> Result<Url, PathError> {
        let local = escape_reserved(local.trim_start_matches('/'));
        self.url.join(&local).map_err(|e| PathError::Join(local, e))
    }

    /// URL of a directory; always ends with `/`.
    pub fn directory_url(&self, local: &str) -> Result<Url, PathError> {
        let mut local = escape_reserved(local.trim_matches('/'));
        if !local.is_empty() {
            local.push('/');
        }
        self.url.join(&local).map_err(|e| PathError::Join(local, e))
    }
}

/// Escape the characters a URL join would otherwise read as syntax.
fn escape_reserved(local: &str) -> String {
    local.replace('%', "%25").replace('#', "%23").replace('?', "%3F")
}

pub fn has_executable_extension(href: &str) -> bool {
    EXECUTABLE_EXTENSIONS.iter().any(|ext| href.ends_with(ext))
}

/// Drop a trailing executable extension so `./pet.gts` and `./pet` name the
/// same module.
pub fn trim_executable_extension(url: &Url) -> Url {
    for ext in EXECUTABLE_EXTENSIONS {
        if let Some(trimmed) = url.as_str().strip_suffix(ext)
            && let Ok(trimmed) = Url::parse(trimmed)
        {
            return trimmed;
        }
    }
    url.clone()
}

/// Instance URL for an instance file (`.../dog.json` becomes `.../dog`).
pub fn trim_instance_extension(url: &Url) -> Option<Url> {
    url.as_str()
        .strip_suffix(INSTANCE_EXTENSION)
        .and_then(|trimmed| Url::parse(trimmed).ok())
}

/// Resolve a module specifier as written in source against the URL of the
/// module (or instance) that mentions it.
///
/// Relative (`./`, `../`, `/`) and absolute URL specifiers resolve to an
/// extension-trimmed absolute URL. Bare package specifiers return `None`.
pub fn resolve_module(specifier: &str, base: &Url) -> Option<Url> {
    let resolved = if specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
    {
        base.join(specifier).ok()?
    } else {
        Url::parse(specifier).ok()?
    };
    Some(trim_executable_extension(&resolved))
}
