//! Derivative size tables.
//!
//! A [`SizeTable`] maps a file-name prefix to a maximum width. The empty
//! prefix is special: it caps the master image itself instead of producing a
//! separate file.
//!
//! ```toml
//! [image_sizes]
//! "" = 1200        # master is resized in place when wider than 1200px
//! "medium_" = 600  # 3/7/1/medium_<id>.jpg
//! "small_" = 200   # 3/7/1/small_<id>.jpg
//! ```
//!
//! Tables are either fixed in config or computed per operation from a caller
//! context ([`SizeTableProvider`]), e.g. different sizes per record type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Prefix → maximum width. Prefixes are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeTable(BTreeMap<String, u32>);

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, prefix: &str, width: u32) -> Self {
        self.0.insert(prefix.to_string(), width);
        self
    }

    pub fn insert(&mut self, prefix: &str, width: u32) -> Option<u32> {
        self.0.insert(prefix.to_string(), width)
    }

    pub fn get(&self, prefix: &str) -> Option<u32> {
        self.0.get(prefix).copied()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.0.contains_key(prefix)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Target width of the master image (empty-prefix entry), if any.
    pub fn master_width(&self) -> Option<u32> {
        self.get("")
    }

    /// The same table without the empty-prefix entry.
    pub fn without_master(&self) -> Self {
        let mut table = self.clone();
        table.0.remove("");
        table
    }

    /// Drop the master entry when the master is already no wider than it.
    pub fn for_master_width(&self, current_width: u32) -> Self {
        match self.master_width() {
            Some(target) if current_width <= target => self.without_master(),
            _ => self.clone(),
        }
    }

    /// All `(prefix, width)` entries in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(p, w)| (p.as_str(), *w))
    }

    /// Named (non-empty prefix) entries only.
    pub fn named(&self) -> impl Iterator<Item = (&str, u32)> {
        self.iter().filter(|(p, _)| !p.is_empty())
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SizeTable {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(p, w)| (p.into(), w)).collect())
    }
}

/// Source of the size table for one operation.
///
/// `C` is an opaque caller context (the owning record, a tenant, …). Static
/// tables ignore it.
pub enum SizeTableProvider<C: ?Sized = ()> {
    Static(SizeTable),
    Dynamic(Arc<dyn Fn(&C) -> SizeTable + Send + Sync>),
}

impl<C: ?Sized> SizeTableProvider<C> {
    pub fn dynamic(f: impl Fn(&C) -> SizeTable + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// Resolve into a concrete table for a single operation.
    pub fn resolve(&self, ctx: &C) -> SizeTable {
        match self {
            Self::Static(table) => table.clone(),
            Self::Dynamic(f) => f(ctx),
        }
    }
}

impl<C: ?Sized> Clone for SizeTableProvider<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(table) => Self::Static(table.clone()),
            Self::Dynamic(f) => Self::Dynamic(Arc::clone(f)),
        }
    }
}

impl<C: ?Sized> fmt::Debug for SizeTableProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(table) => f.debug_tuple("Static").field(table).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<C: ?Sized> From<SizeTable> for SizeTableProvider<C> {
    fn from(table: SizeTable) -> Self {
        Self::Static(table)
    }
}
