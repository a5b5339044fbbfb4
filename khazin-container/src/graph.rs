//! Dependency graph validation.
//!
//! Runs when a provider is built, before the first `get`:
//! - every declared dependency must be registered, with the descriptor type
//!   the declaration names
//! - the graph must be acyclic
//! - with strict lifetimes, no service may depend on a shorter-lived one
//!
//! Registration mistakes therefore surface at start-up instead of on the
//! first request that happens to reach them.

use std::any::TypeId;
use std::collections::{BTreeMap, HashSet};

use khazin_support::rendering::suggest_similar;
use tracing::{debug, instrument, warn};

use crate::collection::ServiceCollection;
use crate::descriptor::Dependency;
use crate::error::{
    CyclicDependencyError, DescriptorMismatchError, KhazinError, LifetimeMismatchError,
    ServiceNotFoundError,
};
use crate::key::IdentityKey;
use crate::lifetime::Lifetime;

const MAX_SUGGESTIONS: usize = 3;

/// One registration, as far as validation is concerned.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub lifetime: Lifetime,
    pub descriptor_type: TypeId,
    pub descriptor_name: &'static str,
    pub dependencies: Vec<Dependency>,
}

/// Depth-first validator over the registered identities.
///
/// An identity with several registrations is one vertex whose edges are the
/// union of its registrations' dependencies. `visiting` holds the vertices on
/// the current DFS path, `path` the same vertices in order for error reports.
pub(crate) struct GraphValidator {
    nodes: BTreeMap<IdentityKey, Vec<Node>>,
    strict_lifetimes: bool,
    visiting: HashSet<IdentityKey>,
    validated: HashSet<IdentityKey>,
    path: Vec<IdentityKey>,
}

impl GraphValidator {
    pub fn new(nodes: BTreeMap<IdentityKey, Vec<Node>>, strict_lifetimes: bool) -> Self {
        Self {
            nodes,
            strict_lifetimes,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    pub fn from_collection(services: &ServiceCollection, strict_lifetimes: bool) -> Self {
        let nodes = services
            .iter()
            .map(|(key, bucket)| {
                let nodes = bucket
                    .iter()
                    .map(|r| Node {
                        lifetime: r.descriptor.lifetime(),
                        descriptor_type: r.descriptor.descriptor_type(),
                        descriptor_name: r.descriptor.descriptor_name(),
                        dependencies: r.descriptor.dependencies(),
                    })
                    .collect();
                (*key, nodes)
            })
            .collect();
        Self::new(nodes, strict_lifetimes)
    }

    /// Validates the whole graph.
    ///
    /// # Errors
    /// - [`KhazinError::ServiceNotFound`]: a dependency is not registered
    /// - [`KhazinError::DescriptorMismatch`]: a dependency is registered with
    ///   another descriptor type than its declaration names
    /// - [`KhazinError::CyclicDependency`]: a cycle was found
    /// - [`KhazinError::LifetimeMismatch`]: strict mode only
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<(), KhazinError> {
        let keys: Vec<IdentityKey> = self.nodes.keys().copied().collect();
        debug!(services = keys.len(), strict = self.strict_lifetimes, "Validating dependency graph");

        for key in keys {
            self.validate_key(&key)?;
        }

        debug!("Dependency graph is valid");
        Ok(())
    }

    fn validate_key(&mut self, key: &IdentityKey) -> Result<(), KhazinError> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(*key);

            warn!(cycle = ?chain, "Cyclic dependency detected");
            return Err(KhazinError::CyclicDependency(CyclicDependencyError { chain }));
        }

        let Some(nodes) = self.nodes.get(key).cloned() else {
            let required_by = self.path.last().copied();
            warn!(missing = %key, required_by = ?required_by, "Unregistered dependency");
            return Err(KhazinError::ServiceNotFound(ServiceNotFoundError {
                requested: *key,
                required_by,
                suggestions: similar_keys(key, self.nodes.keys().copied()),
            }));
        };

        self.visiting.insert(*key);
        self.path.push(*key);

        for node in &nodes {
            for dependency in &node.dependencies {
                self.check_descriptor(key, dependency)?;
                if self.strict_lifetimes {
                    self.check_lifetimes(key, node.lifetime, &dependency.key)?;
                }
                self.validate_key(&dependency.key)?;
            }
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(*key);
        Ok(())
    }

    /// Resolution goes through the first registration of an identity, so that
    /// one must carry the descriptor type the dependency declaration names.
    /// Unregistered dependencies are left to `validate_key`.
    fn check_descriptor(
        &self,
        consumer: &IdentityKey,
        dependency: &Dependency,
    ) -> Result<(), KhazinError> {
        let Some(registered) = self.nodes.get(&dependency.key).and_then(|nodes| nodes.first())
        else {
            return Ok(());
        };

        if registered.descriptor_type != dependency.descriptor_type {
            warn!(
                consumer = %consumer,
                dependency = %dependency.key,
                requested = dependency.descriptor_name,
                registered = registered.descriptor_name,
                "Descriptor mismatch"
            );
            return Err(KhazinError::DescriptorMismatch(DescriptorMismatchError {
                key: dependency.key,
                requested: dependency.descriptor_name,
                registered: registered.descriptor_name,
                required_by: Some(*consumer),
            }));
        }

        Ok(())
    }

    /// A consumer may only depend on services living at least as long.
    /// Transients may depend on anything.
    fn check_lifetimes(
        &self,
        consumer: &IdentityKey,
        consumer_lifetime: Lifetime,
        dependency: &IdentityKey,
    ) -> Result<(), KhazinError> {
        let Some(dependency_lifetime) = self
            .nodes
            .get(dependency)
            .and_then(|nodes| nodes.first())
            .map(|node| node.lifetime)
        else {
            return Ok(());
        };

        if consumer_lifetime > dependency_lifetime {
            warn!(
                consumer = %consumer,
                consumer_lifetime = %consumer_lifetime,
                dependency = %dependency,
                dependency_lifetime = %dependency_lifetime,
                "Lifetime mismatch"
            );
            return Err(KhazinError::LifetimeMismatch(LifetimeMismatchError {
                dependency: *dependency,
                dependency_lifetime,
                consumer: *consumer,
                consumer_lifetime,
            }));
        }

        Ok(())
    }
}

/// Registered identities whose type name resembles `key`'s.
pub(crate) fn similar_keys(
    key: &IdentityKey,
    registered: impl IntoIterator<Item = IdentityKey>,
) -> Vec<IdentityKey> {
    let candidates: Vec<IdentityKey> = registered.into_iter().filter(|k| k != key).collect();
    let names: Vec<&str> = candidates.iter().map(|k| k.type_name()).collect();

    suggest_similar(key.type_name(), &names, MAX_SUGGESTIONS)
        .into_iter()
        .filter_map(|name| candidates.iter().find(|k| k.type_name() == name).copied())
        .collect()
}
