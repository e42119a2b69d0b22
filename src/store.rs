//! Namespaced storage for service entries.
//!
//! The store is a plain two-level map: namespace name to a map from
//! [ServiceKey] to [Entry]. It owns no policy beyond the strict-duplicate
//! flag passed in by the container facade; construction timing, namespace
//! selection and wrapping all happen one layer up.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::arguments::ServiceArguments;
use crate::construct::Constructible;

/// Namespace used when none is selected explicitly.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A shared, type-erased service instance.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Identifies a registered capability.
///
/// The key is the [TypeId] of the service *value* type, typically an
/// `Arc<dyn Capability>` trait object. The type name is carried along for
/// diagnostics only and takes no part in equality.
#[derive(Clone, Copy, Debug)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The value stored under a `(namespace, key)` pair.
#[derive(Clone)]
pub enum Entry {
    /// An already-constructed value, returned as-is on every resolve.
    Instance(SharedInstance),
    /// A descriptor to be constructed on demand.
    Constructible(Constructible),
    /// A target paired with extra constructor arguments.
    Wrapped(ServiceArguments),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Instance(_) => f.write_str("Entry::Instance"),
            Entry::Constructible(c) => write!(f, "Entry::Constructible({})", c.service()),
            Entry::Wrapped(_) => f.write_str("Entry::Wrapped"),
        }
    }
}

/// Errors reported by registration, construction and resolution.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("service {0} is already registered")]
    AlreadyRegistered(ServiceKey),
    #[error("service {0} is not registered")]
    NotRegistered(ServiceKey),
    #[error("service {service} requires the following services which are not available: {}", .missing.join(", "))]
    MissingRequirements {
        service: &'static str,
        missing: Vec<&'static str>,
    },
    #[error("service {service} does not provide the capability {key}")]
    NotConformant {
        service: &'static str,
        key: ServiceKey,
    },
    #[error("service {service} requires another service under its own registration key {key}")]
    RequiresIdenticalCapability {
        service: &'static str,
        key: ServiceKey,
    },
    #[error("construction of {service} failed: {reason}")]
    ConstructionFailed {
        service: &'static str,
        reason: String,
    },
}

/// Per-namespace mapping from key to entry.
///
/// Namespaces are created lazily the first time they are written to.
#[derive(Default)]
pub(crate) struct RegistryStore {
    namespaces: HashMap<String, HashMap<ServiceKey, Entry>>,
}

impl RegistryStore {
    /// Insert an entry, failing on duplicates only under the strict policy.
    pub fn register(
        &mut self,
        namespace: &str,
        key: ServiceKey,
        entry: Entry,
        strict: bool,
    ) -> Result<(), ContainerError> {
        let services = self.namespaces.entry(namespace.to_owned()).or_default();
        if strict && services.contains_key(&key) {
            return Err(ContainerError::AlreadyRegistered(key));
        }
        debug!(%key, namespace, "registered service");
        services.insert(key, entry);
        Ok(())
    }

    /// Insert an entry, overwriting any previous one.
    pub fn replace(&mut self, namespace: &str, key: ServiceKey, entry: Entry) {
        debug!(%key, namespace, "replaced service");
        self.namespaces
            .entry(namespace.to_owned())
            .or_default()
            .insert(key, entry);
    }

    /// Delete an entry; absent keys are a no-op.
    pub fn remove(&mut self, namespace: &str, key: ServiceKey) {
        if let Some(services) = self.namespaces.get_mut(namespace) {
            if services.remove(&key).is_some() {
                trace!(%key, namespace, "removed service");
            }
        }
    }

    pub fn get(&self, namespace: &str, key: ServiceKey) -> Option<Entry> {
        self.namespaces
            .get(namespace)
            .and_then(|services| services.get(&key))
            .cloned()
    }

    pub fn clear(&mut self) {
        self.namespaces.clear();
    }

    /// Every `(namespace, key)` pair currently stored, for the sanity check.
    pub fn entries(&self) -> Vec<(String, ServiceKey)> {
        self.namespaces
            .iter()
            .flat_map(|(ns, services)| services.keys().map(move |key| (ns.clone(), *key)))
            .collect()
    }
}
