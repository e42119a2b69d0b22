//! Argument bags and the wrapper pairing a target with extra arguments.
//!
//! Constructors receive their parameters through an [ArgumentBag]: a named
//! collection of type-erased shared values. The bag is filled by the
//! construction engine from resolved dependencies and from caller-supplied
//! arguments, with resolved dependencies taking precedence on name
//! collisions.
//!
//! [ServiceArguments] is the wrapper stored as a `Wrapped` entry: it pairs a
//! to-be-constructed target with arguments to merge in at construction time.
//! A custom [ProvideArguments] source can compute values anew on every
//! resolution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::construct::Constructible;
use crate::store::{ContainerError, ServiceKey, SharedInstance};

/// Named, type-erased constructor arguments.
#[derive(Clone, Default)]
pub struct ArgumentBag {
    values: HashMap<String, SharedInstance>,
}

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub(crate) fn insert_shared(&mut self, name: &str, value: SharedInstance) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Extract a typed argument, as called from constructor closures.
    ///
    /// The requesting service name is only used to report failures.
    pub fn demand<T: Clone + Send + Sync + 'static>(
        &self,
        service: &'static str,
        name: &str,
    ) -> Result<T, ContainerError> {
        self.values
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| ContainerError::ConstructionFailed {
                service,
                reason: format!("missing or mismatched constructor argument `{name}`"),
            })
    }

    pub(crate) fn merge_over(&mut self, other: ArgumentBag) {
        self.values.extend(other.values);
    }
}

/// Source of constructor arguments, evaluated once per resolution.
///
/// Implement this to inject computed values right before construction; the
/// produced bag is overlaid on the wrapper's static arguments.
pub trait ProvideArguments: Send + Sync {
    fn arguments(&self) -> ArgumentBag;
}

/// The target carried by a wrapped registration.
#[derive(Clone)]
pub enum WrapTarget {
    Instance(ServiceKey, SharedInstance),
    Constructible(Constructible),
}

impl WrapTarget {
    pub(crate) fn key(&self) -> ServiceKey {
        match self {
            WrapTarget::Instance(key, _) => *key,
            WrapTarget::Constructible(c) => c.output(),
        }
    }
}

/// Pairs a to-be-constructed target with extra constructor arguments.
#[derive(Clone, Default)]
pub struct ServiceArguments {
    target: Option<WrapTarget>,
    bag: ArgumentBag,
    source: Option<Arc<dyn ProvideArguments>>,
}

impl ServiceArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static argument.
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.bag.insert(name, value);
        self
    }

    /// Attach a source computing arguments on every unwrap.
    pub fn with_source(mut self, source: impl ProvideArguments + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Select a constructible target; its output key is the registration key.
    pub fn for_service(mut self, service: Constructible) -> Self {
        self.target = Some(WrapTarget::Constructible(service));
        self
    }

    /// Select an already-built target, registered under the key of `T`.
    pub fn for_instance<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.target = Some(WrapTarget::Instance(ServiceKey::of::<T>(), Arc::new(value)));
        self
    }

    pub(crate) fn key(&self) -> Option<ServiceKey> {
        self.target.as_ref().map(WrapTarget::key)
    }

    /// Produce the target and the argument bag for one resolution.
    ///
    /// Called exactly once per resolution, immediately before the
    /// construction decision.
    pub(crate) fn unwrap(&self) -> (Option<WrapTarget>, ArgumentBag) {
        let mut bag = self.bag.clone();
        if let Some(source) = &self.source {
            bag.merge_over(source.arguments());
        }
        (self.target.clone(), bag)
    }
}
