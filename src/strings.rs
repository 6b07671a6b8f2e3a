//! Per-formatter string interning.
//!
//! Actions, wrapper names and part names are interned once when a formatter
//! is built. Calls only clone the resulting [`InternedString`] handles, which
//! share one allocation per distinct string.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Handle to a string stored in a [`StringTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternedString {
    id: usize,
    value: Arc<str>,
}

impl InternedString {
    /// Position of the string in its table.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether both handles point at the same table entry.
    #[inline]
    pub fn ptr_eq(&self, other: &InternedString) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Deref for InternedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Collects strings while a formatter is being built.
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    capacity: usize,
    strings: Vec<Arc<str>>,
    index: HashMap<Arc<str>, usize>,
}

impl StringTableBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            strings: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Intern `s`, returning the existing entry when already present.
    pub fn add(&mut self, s: &str) -> InternedString {
        if let Some(&id) = self.index.get(s) {
            return InternedString {
                id,
                value: Arc::clone(&self.strings[id]),
            };
        }

        let value: Arc<str> = Arc::from(s);
        let id = self.strings.len();
        self.strings.push(Arc::clone(&value));
        self.index.insert(Arc::clone(&value), id);
        InternedString { id, value }
    }

    /// Freeze the table.
    pub fn build(self) -> StringTable {
        StringTable {
            capacity: self.capacity,
            strings: self.strings,
            index: self.index,
        }
    }
}

/// Immutable interning table owned by one formatter.
#[derive(Debug)]
pub struct StringTable {
    capacity: usize,
    strings: Vec<Arc<str>>,
    index: HashMap<Arc<str>, usize>,
}

impl StringTable {
    /// Number of distinct strings.
    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Capacity the table was sized for.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, s: &str) -> Option<InternedString> {
        self.index.get(s).map(|&id| InternedString {
            id,
            value: Arc::clone(&self.strings[id]),
        })
    }

    #[inline]
    pub fn contains(&self, s: &str) -> bool {
        self.index.contains_key(s)
    }
}
