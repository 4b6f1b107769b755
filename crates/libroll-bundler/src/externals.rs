//! External-module resolution.
//!
//! One [`ExternalSet`] is computed per invocation and shared by every format:
//! externalization policy never depends on the output packaging.

use std::sync::Arc;

use rustc_hash::FxHashSet;

/// Module names the bundle references instead of inlining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalSet {
    names: FxHashSet<String>,
}

impl ExternalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package name. Duplicates are ignored.
    pub fn insert(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() {
            self.names.insert(name);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Member names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `request` names a member or a deep path inside one.
    ///
    /// `foo` matches `foo` and `foo/bar`, never `foobar`.
    pub fn is_external(&self, request: &str) -> bool {
        if self.names.contains(request) {
            return true;
        }
        request
            .match_indices('/')
            .any(|(i, _)| self.names.contains(&request[..i]))
    }
}

impl<S: Into<String>> FromIterator<S> for ExternalSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ExternalSet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ExternalSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

/// The independent lists the shared set is built from.
#[derive(Debug, Clone, Default)]
pub struct ExternalSources {
    /// Package names of workspace projects the unit depends on
    pub workspace_dependencies: Vec<String>,
    /// Keys of the unit's `package.json` `dependencies`
    pub manifest_dependencies: Vec<String>,
    /// `external` from the build options
    pub explicit: Vec<String>,
    /// Registry packages reachable through the workspace graph
    pub transitive_packages: Vec<String>,
}

impl ExternalSources {
    /// Union of every list, resolved once per execution.
    pub fn resolve(&self) -> ExternalSet {
        let mut set = ExternalSet::new();
        set.extend(self.workspace_dependencies.iter().cloned());
        set.extend(self.manifest_dependencies.iter().cloned());
        set.extend(self.explicit.iter().cloned());
        set.extend(self.transitive_packages.iter().cloned());
        tracing::debug!("Resolved {} external modules", set.len());
        set
    }
}

/// Externalization test attached to every format's output descriptor.
///
/// A request is external if it matches the shared set or one of the unit's
/// direct registry dependencies.
#[derive(Debug, Clone, Default)]
pub struct ExternalPredicate {
    shared: Arc<ExternalSet>,
    npm: Arc<ExternalSet>,
}

impl ExternalPredicate {
    pub fn new(shared: Arc<ExternalSet>, npm: Arc<ExternalSet>) -> Self {
        Self { shared, npm }
    }

    pub fn is_external(&self, request: &str) -> bool {
        self.shared.is_external(request) || self.npm.is_external(request)
    }

    /// Every name the predicate matches on, sorted and deduplicated.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .names()
            .into_iter()
            .chain(self.npm.names())
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Whether both predicates point at the same shared set instance.
    pub fn shares_set_with(&self, other: &ExternalPredicate) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
