//! An append-only dictionary of interned strings.
//!
//! Every string handed to [`Dict::insert`] is stored once and addressed by a
//! small copyable [`Sym`] handle. Two handles compare equal exactly when the
//! strings they stand for compare equal, so schema matching and value
//! comparison throughout the library reduce to integer comparison.
//!
//! ```
//! use yangtree_dict::Dict;
//!
//! let dict = Dict::new();
//! let a = dict.insert("interface");
//! let b = dict.insert("interface");
//! assert_eq!(a, b);
//! assert_eq!(dict.resolve(a), "interface");
//! ```
//!
//! The dictionary only ever grows; entries live as long as the dictionary
//! itself. Interned strings can be looked up without inserting via
//! [`Dict::find`], which is how parsers test whether an incoming name can
//! possibly match anything already known to the schema.
#![warn(missing_docs)]

use std::{collections::HashMap, sync::Mutex};

use elsa::FrozenVec;

/// A handle to a string interned in a [`Dict`]
///
/// Handles are only meaningful together with the dictionary that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(u32);

/// An append-only store of unique strings
///
/// Reads and inserts work through a shared reference, so a dictionary can be
/// consulted from anywhere a schema or data tree is held.
#[derive(Default)]
pub struct Dict {
    index: Mutex<HashMap<String, Sym>>,
    strings: FrozenVec<String>,
}

impl std::fmt::Debug for Dict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.strings.len())
            .finish()
    }
}

impl Dict {
    /// Constructs an empty dictionary
    pub fn new() -> Self {
        Default::default()
    }

    /// Interns `value`, returning the handle shared by all equal strings
    pub fn insert(&self, value: &str) -> Sym {
        let mut locked = self.index.lock().expect("Lock poisoned");
        if let Some(sym) = locked.get(value) {
            return *sym;
        }
        let sym = Sym(self.strings.len() as u32);
        self.strings.push(value.to_owned());
        locked.insert(value.to_owned(), sym);
        sym
    }

    /// Interns an already-owned string, consuming it instead of copying when
    /// it has not been seen before
    pub fn insert_owned(&self, value: String) -> Sym {
        let mut locked = self.index.lock().expect("Lock poisoned");
        if let Some(sym) = locked.get(value.as_str()) {
            return *sym;
        }
        let sym = Sym(self.strings.len() as u32);
        locked.insert(value.clone(), sym);
        self.strings.push(value);
        sym
    }

    /// Returns the handle for `value` if it has been interned before
    pub fn find(&self, value: &str) -> Option<Sym> {
        self.index
            .lock()
            .expect("Lock poisoned")
            .get(value)
            .copied()
    }

    /// Returns the string behind a handle
    ///
    /// Panics if the handle came from a different dictionary.
    pub fn resolve(&self, sym: Sym) -> &str {
        self.strings
            .get(sym.0 as usize)
            .expect("Sym issued by another dictionary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_a_handle() {
        let dict = Dict::new();
        let a = dict.insert("alpha");
        let b = dict.insert("beta");
        let a2 = dict.insert("alpha");
        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_returns_the_original() {
        let dict = Dict::new();
        let sym = dict.insert_owned(String::from("gamma"));
        assert_eq!(dict.resolve(sym), "gamma");
    }

    #[test]
    fn find_does_not_insert() {
        let dict = Dict::new();
        assert_eq!(dict.find("missing"), None);
        let sym = dict.insert("present");
        assert_eq!(dict.find("present"), Some(sym));
    }
}
