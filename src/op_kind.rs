use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashSet;

use crate::hash::{hash_of, HashValue};

lazy_static::lazy_static! {
    static ref INTERNED: Mutex<FxHashSet<&'static str>> = Mutex::new(FxHashSet::default());
}

fn intern(qualified: &str) -> &'static str {
    let mut table = INTERNED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(s) = table.get(qualified) {
        return *s;
    }
    let s: &'static str = Box::leak(qualified.to_owned().into_boxed_str());
    table.insert(s);
    s
}

/// Interned `namespace::name` symbol identifying an operation category.
///
/// Two kinds are equal when they were interned from the same qualified name,
/// which is checked by pointer identity.
#[derive(Clone, Copy)]
pub struct OpKind {
    qualified: &'static str,
    ns_len: usize,
}

impl OpKind {
    /// Panics if either part contains the `::` separator.
    pub fn new(namespace: &str, name: &str) -> Self {
        assert!(
            !namespace.contains("::") && !name.contains("::"),
            "op kind parts must not contain '::': {namespace:?}, {name:?}"
        );
        Self {
            qualified: intern(&format!("{namespace}::{name}")),
            ns_len: namespace.len(),
        }
    }

    /// Parses `namespace::name`. A name without namespace lands in `aten`.
    pub fn from_qualified(qualified: &str) -> Self {
        match qualified.split_once("::") {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new("aten", qualified),
        }
    }

    pub fn namespace(&self) -> &'static str {
        &self.qualified[..self.ns_len]
    }

    pub fn name(&self) -> &'static str {
        &self.qualified[self.ns_len + 2..]
    }

    pub fn as_str(&self) -> &'static str {
        self.qualified
    }

    pub fn hash(&self) -> HashValue {
        hash_of(self.qualified)
    }
}

impl PartialEq for OpKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.qualified, other.qualified)
    }
}

impl Eq for OpKind {}

impl std::hash::Hash for OpKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.qualified.hash(state)
    }
}

impl core::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified)
    }
}

impl core::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpKind({})", self.qualified)
    }
}
