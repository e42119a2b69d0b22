//! One-to-many registration under a single key.
//!
//! Multi-registered services live outside the namespace partitioning and are
//! resolved as a lazy sequence of freshly constructed instances, one per
//! member, in registration order. Members must be stateless or idempotent to
//! construct, since every iteration builds new objects.

use std::collections::HashMap;
use std::marker::PhantomData;

use tracing::debug;

use crate::arguments::ArgumentBag;
use crate::construct::Constructible;
use crate::container::ServiceContainer;
use crate::store::{ContainerError, ServiceKey};

/// Ordered sets of constructibles, keyed by capability.
#[derive(Default)]
pub(crate) struct MultiRegistry {
    services: HashMap<ServiceKey, Vec<Constructible>>,
}

impl MultiRegistry {
    /// Append a member after validating conformance and self-reference.
    ///
    /// A failing member is never added to the set.
    pub fn register(&mut self, key: ServiceKey, service: Constructible) -> Result<(), ContainerError> {
        if service.output() != key {
            return Err(ContainerError::NotConformant {
                service: service.service(),
                key,
            });
        }
        if service.requires().iter().any(|req| req.key() == key) {
            return Err(ContainerError::RequiresIdenticalCapability {
                service: service.service(),
                key,
            });
        }
        debug!(%key, service = service.service(), "multi-registered service");
        self.services.entry(key).or_default().push(service);
        Ok(())
    }

    /// Snapshot of the members registered under `key`, in order.
    pub fn members(&self, key: ServiceKey) -> Vec<Constructible> {
        self.services.get(&key).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.services.clear();
    }
}

/// Lazy sequence of freshly constructed multi-registered instances.
///
/// Each call to `next` constructs the following member from scratch;
/// re-calling `resolve_multi` restarts the sequence with new instances.
pub struct MultiResolve<'c, T> {
    container: &'c ServiceContainer,
    members: std::vec::IntoIter<Constructible>,
    _marker: PhantomData<fn() -> T>,
}

impl<'c, T> MultiResolve<'c, T> {
    pub(crate) fn new(container: &'c ServiceContainer, members: Vec<Constructible>) -> Self {
        Self {
            container,
            members: members.into_iter(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Iterator for MultiResolve<'_, T> {
    type Item = Result<T, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let member = self.members.next()?;
        Some(self.container.construct_as::<T>(&member, None, &ArgumentBag::new()))
    }
}
