//! Core domain types for harvesting identifiers out of browsing contexts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Fixed prefix of the resource locators being harvested.
pub const SCHEME_PREFIX: &str = "magnet:?xt=urn:btih";

/// Address schemes that belong to the host itself and can never be scripted.
pub const SYSTEM_SCHEMES: &[&str] = &[
    "chrome",
    "edge",
    "about",
    "chrome-extension",
    "devtools",
    "view-source",
];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one harvest cycle (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Opaque handle the host assigns to a browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A browsing context as observed through the host.
///
/// Contexts are owned by the host environment; tabharvest only reads them and
/// toggles which one is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Host-assigned handle.
    pub id: ContextId,
    /// Current address of the context (may be empty while loading).
    pub address: String,
    /// Whether this context is the active one in its workspace.
    pub active: bool,
}

impl Context {
    /// Whether content can be injected into this context.
    pub fn is_scriptable(&self) -> bool {
        is_scriptable_address(&self.address)
    }
}

/// Check whether an address can be scripted.
///
/// Empty addresses, unparseable addresses and addresses using one of the
/// [`SYSTEM_SCHEMES`] are never scriptable.
pub fn is_scriptable_address(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() {
        return false;
    }

    match Url::parse(address) {
        Ok(url) => !SYSTEM_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

/// Materialized content of a context, as seen from inside its content realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Address the content was loaded from; used to resolve relative links.
    pub address: String,
    /// The rendered document markup.
    pub html: String,
}

// ---------------------------------------------------------------------------
// ExtractedIdentifier
// ---------------------------------------------------------------------------

/// A harvested resource locator, kept byte-for-byte as found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedIdentifier(String);

impl ExtractedIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ExtractedIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ResultSet
// ---------------------------------------------------------------------------

/// Unique identifiers in first-insertion order.
///
/// Equality is exact string equality: identifiers that differ only in case or
/// percent-encoding are distinct members.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    order: Vec<ExtractedIdentifier>,
    seen: HashSet<ExtractedIdentifier>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identifier. Returns `true` if it was not already present.
    pub fn insert(&mut self, identifier: ExtractedIdentifier) -> bool {
        if self.seen.contains(&identifier) {
            return false;
        }
        self.seen.insert(identifier.clone());
        self.order.push(identifier);
        true
    }

    /// Merge a batch of identifiers, returning how many were new.
    pub fn extend<I>(&mut self, identifiers: I) -> usize
    where
        I: IntoIterator<Item = ExtractedIdentifier>,
    {
        let mut added = 0;
        for identifier in identifiers {
            if self.insert(identifier) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, identifier: &ExtractedIdentifier) -> bool {
        self.seen.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtractedIdentifier> {
        self.order.iter()
    }

    /// Sort members lexicographically by their bytes.
    pub fn sort(&mut self) {
        self.order.sort();
    }
}
