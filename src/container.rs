//! The container facade and its construction engine.
//!
//! All registry state sits behind a single reentrant lock: construction
//! recursively re-enters the facade while resolving dependencies, so a plain
//! mutex would deadlock on the first nested lookup. Mutation goes through a
//! [RefCell] whose borrows are short-lived and never held across recursion
//! or user code.
//!
//! The container is intended for single-threaded initialization followed by
//! read-mostly use; the lock makes interleaved access safe but does not try
//! to make it fast.

use std::cell::RefCell;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::ReentrantMutex;
use tracing::trace;

use crate::arguments::{ArgumentBag, ServiceArguments, WrapTarget};
use crate::construct::{BoxedService, Constructible};
use crate::multi::{MultiRegistry, MultiResolve};
use crate::store::{ContainerError, Entry, RegistryStore, ServiceKey, SharedInstance, DEFAULT_NAMESPACE};

type NamespaceResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

struct ContainerState {
    store: RegistryStore,
    multi: MultiRegistry,
    current_namespace: String,
    previous_namespace: Option<String>,
    namespace_resolver: Option<NamespaceResolver>,
    lazy_construction: Option<bool>,
    strict_duplicates: bool,
}

impl Default for ContainerState {
    fn default() -> Self {
        Self {
            store: RegistryStore::default(),
            multi: MultiRegistry::default(),
            current_namespace: DEFAULT_NAMESPACE.to_owned(),
            previous_namespace: None,
            namespace_resolver: None,
            lazy_construction: None,
            strict_duplicates: false,
        }
    }
}

/// Runtime service registry: register implementations against capability
/// keys, optionally scoped to a namespace, and resolve them later.
///
/// Under the default lazy policy a constructible is stored as-is and built
/// at resolution time, every time; under the eager policy it is built once
/// at registration time and stored as an instance.
#[derive(Default)]
pub struct ServiceContainer {
    state: ReentrantMutex<RefCell<ContainerState>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the state under the lock.
    ///
    /// The borrow must not escape `f`, and `f` must not run user code that
    /// could re-enter the container.
    fn with_state<R>(&self, f: impl FnOnce(&mut ContainerState) -> R) -> R {
        let guard = self.state.lock();
        let result = f(&mut *guard.borrow_mut());
        result
    }

    /// The namespace an operation targets: explicit argument, else resolver
    /// callback, else the current-namespace pointer.
    fn target_namespace(&self, explicit: Option<&str>) -> String {
        if let Some(ns) = explicit {
            if !ns.is_empty() {
                return ns.to_owned();
            }
        }
        let (resolver, current) =
            self.with_state(|s| (s.namespace_resolver.clone(), s.current_namespace.clone()));
        // The callback is user code, so it runs outside the state borrow.
        if let Some(resolver) = resolver {
            if let Some(ns) = resolver() {
                return ns;
            }
        }
        current
    }

    fn lazy_construction(&self) -> bool {
        self.with_state(|s| s.lazy_construction.unwrap_or(true))
    }

    /// Select the construction policy; the first explicit setting wins for
    /// the lifetime of the container, later calls are ignored.
    pub fn set_lazy_construction(&self, lazy: bool) {
        self.with_state(|s| {
            if s.lazy_construction.is_none() {
                s.lazy_construction = Some(lazy);
            }
        });
    }

    /// Make duplicate registration under one `(namespace, key)` an error.
    /// The default is permissive overwrite.
    pub fn set_strict_duplicate_check(&self, strict: bool) {
        self.with_state(|s| s.strict_duplicates = strict);
    }

    // ---- registration ----

    /// Register a constructible under its declared output key.
    ///
    /// Under the eager policy the service is constructed here, so its
    /// dependencies must already be registered.
    pub fn register(
        &self,
        service: Constructible,
        namespace: Option<&str>,
    ) -> Result<(), ContainerError> {
        let _guard = self.state.lock();
        let ns = self.target_namespace(namespace);
        let key = service.output();
        let entry = if self.lazy_construction() {
            Entry::Constructible(service)
        } else {
            let built = self.construct(&service, Some(&ns), &ArgumentBag::new())?;
            Entry::Instance(Arc::from(built))
        };
        self.with_state(|s| s.store.register(&ns, key, entry, s.strict_duplicates))
    }

    /// Register an already-built value under the key of its own type.
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        value: T,
        namespace: Option<&str>,
    ) -> Result<(), ContainerError> {
        let ns = self.target_namespace(namespace);
        let key = ServiceKey::of::<T>();
        self.with_state(|s| {
            s.store
                .register(&ns, key, Entry::Instance(Arc::new(value)), s.strict_duplicates)
        })
    }

    /// Register a wrapped target under the key of the wrapped service.
    ///
    /// Under the lazy policy the wrapper is stored intact and unwrapped on
    /// every resolution; under the eager policy it is unwrapped and
    /// constructed here.
    pub fn register_wrapped(
        &self,
        arguments: ServiceArguments,
        namespace: Option<&str>,
    ) -> Result<(), ContainerError> {
        let _guard = self.state.lock();
        let Some(key) = arguments.key() else {
            return Err(ContainerError::ConstructionFailed {
                service: "<wrapper>",
                reason: "no target selected for the wrapped registration".to_owned(),
            });
        };
        let ns = self.target_namespace(namespace);
        let entry = if self.lazy_construction() {
            Entry::Wrapped(arguments)
        } else {
            match arguments.unwrap() {
                (Some(WrapTarget::Instance(_, value)), _) => Entry::Instance(value),
                (Some(WrapTarget::Constructible(service)), args) => {
                    let built = self.construct(&service, Some(&ns), &args)?;
                    Entry::Instance(Arc::from(built))
                }
                (None, _) => unreachable!("key() guarantees a target"),
            }
        };
        self.with_state(|s| s.store.register(&ns, key, entry, s.strict_duplicates))
    }

    /// Overwrite the entry for the constructible's output key.
    ///
    /// Never fails, regardless of the duplicate policy, and never constructs
    /// eagerly; resolution builds the service on demand.
    pub fn replace(&self, service: Constructible, namespace: Option<&str>) {
        let ns = self.target_namespace(namespace);
        let key = service.output();
        self.with_state(|s| s.store.replace(&ns, key, Entry::Constructible(service)));
    }

    /// Overwrite the entry for the key of `T` with an already-built value.
    pub fn replace_instance<T: Send + Sync + 'static>(&self, value: T, namespace: Option<&str>) {
        let ns = self.target_namespace(namespace);
        let key = ServiceKey::of::<T>();
        self.with_state(|s| s.store.replace(&ns, key, Entry::Instance(Arc::new(value))));
    }

    /// Delete the entry for the key of `T`; absent keys are a no-op.
    pub fn remove<T: Send + Sync + 'static>(&self, namespace: Option<&str>) {
        let ns = self.target_namespace(namespace);
        self.with_state(|s| s.store.remove(&ns, ServiceKey::of::<T>()));
    }

    /// Drop every registration and reset namespaces, policy and resolver.
    pub fn clear(&self) {
        self.with_state(|s| {
            s.store.clear();
            s.multi.clear();
            s.current_namespace = DEFAULT_NAMESPACE.to_owned();
            s.previous_namespace = None;
            s.namespace_resolver = None;
            s.lazy_construction = None;
            s.strict_duplicates = false;
        });
    }

    // ---- construction engine ----

    /// Construct a service, resolving its declared requirements from the
    /// registry and merging them over `extra`.
    ///
    /// Dependencies are resolved depth-first with no cycle guard: a cyclic
    /// dependency between singly-registered keys recurses until the stack
    /// runs out. A requirement satisfied by neither the registry nor `extra`
    /// is recorded, and construction fails with the full list of missing
    /// keys before the constructor is invoked.
    pub fn construct(
        &self,
        service: &Constructible,
        namespace: Option<&str>,
        extra: &ArgumentBag,
    ) -> Result<BoxedService, ContainerError> {
        let ns = self.target_namespace(namespace);
        trace!(service = service.service(), namespace = %ns, "constructing service");
        let mut args = extra.clone();
        let mut missing = Vec::new();
        for req in service.requires() {
            let entry = self.with_state(|s| s.store.get(&ns, req.key()));
            match entry {
                Some(Entry::Instance(value)) => args.insert_shared(req.name(), value),
                Some(Entry::Constructible(dep)) => {
                    let built = self.construct(&dep, Some(&ns), &ArgumentBag::new())?;
                    args.insert_shared(req.name(), Arc::from(built));
                }
                Some(Entry::Wrapped(wrapper)) => match wrapper.unwrap() {
                    (Some(WrapTarget::Instance(_, value)), _) => {
                        args.insert_shared(req.name(), value)
                    }
                    (Some(WrapTarget::Constructible(dep)), wrapped_args) => {
                        let built = self.construct(&dep, Some(&ns), &wrapped_args)?;
                        args.insert_shared(req.name(), Arc::from(built));
                    }
                    (None, _) => missing.push(req.key().name()),
                },
                None if args.contains(req.name()) => {}
                None => missing.push(req.key().name()),
            }
        }
        if !missing.is_empty() {
            return Err(ContainerError::MissingRequirements {
                service: service.service(),
                missing,
            });
        }
        service.invoke(&args)
    }

    /// Construct and downcast to the expected service value type.
    pub(crate) fn construct_as<T: Send + Sync + 'static>(
        &self,
        service: &Constructible,
        namespace: Option<&str>,
        extra: &ArgumentBag,
    ) -> Result<T, ContainerError> {
        let built = self.construct(service, namespace, extra)?;
        built
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| ContainerError::NotConformant {
                service: service.service(),
                key: ServiceKey::of::<T>(),
            })
    }

    // ---- resolution ----

    /// Look up and, if needed, construct the entry for `key`.
    ///
    /// A wrapped entry is unwrapped exactly once, before the construction
    /// decision. Constructibles are built fresh on every call; instances are
    /// returned verbatim.
    fn resolve_erased(
        &self,
        key: ServiceKey,
        namespace: Option<&str>,
    ) -> Result<Option<SharedInstance>, ContainerError> {
        let ns = self.target_namespace(namespace);
        let Some(entry) = self.with_state(|s| s.store.get(&ns, key)) else {
            trace!(%key, namespace = %ns, "service not registered");
            return Ok(None);
        };
        trace!(%key, namespace = %ns, "resolving service");
        let (target, args) = match entry {
            Entry::Instance(value) => return Ok(Some(value)),
            Entry::Constructible(service) => {
                (WrapTarget::Constructible(service), ArgumentBag::new())
            }
            Entry::Wrapped(wrapper) => match wrapper.unwrap() {
                (Some(target), args) => (target, args),
                (None, _) => {
                    return Err(ContainerError::ConstructionFailed {
                        service: "<wrapper>",
                        reason: "wrapped registration has no target".to_owned(),
                    })
                }
            },
        };
        match target {
            WrapTarget::Instance(_, value) => Ok(Some(value)),
            WrapTarget::Constructible(service) => {
                let built = self.construct(&service, Some(&ns), &args)?;
                Ok(Some(Arc::from(built)))
            }
        }
    }

    /// Resolve the service registered under the key of `T`.
    ///
    /// An absent key yields `Ok(None)`; construction failures are errors.
    pub fn resolve<T: Clone + Send + Sync + 'static>(
        &self,
        namespace: Option<&str>,
    ) -> Result<Option<T>, ContainerError> {
        let key = ServiceKey::of::<T>();
        match self.resolve_erased(key, namespace)? {
            None => Ok(None),
            Some(value) => value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or(ContainerError::NotConformant {
                    service: key.name(),
                    key,
                }),
        }
    }

    /// Resolve, turning an absent key into [ContainerError::NotRegistered].
    pub fn resolve_required<T: Clone + Send + Sync + 'static>(
        &self,
        namespace: Option<&str>,
    ) -> Result<T, ContainerError> {
        self.resolve(namespace)?
            .ok_or(ContainerError::NotRegistered(ServiceKey::of::<T>()))
    }

    // ---- multi-registration ----

    /// Append a member to the multi-set of the key of `T`.
    ///
    /// Fails without appending if the member does not produce `T` or if it
    /// declares a dependency on its own registration key.
    pub fn multi_register<T: Send + Sync + 'static>(
        &self,
        service: Constructible,
    ) -> Result<(), ContainerError> {
        let key = ServiceKey::of::<T>();
        self.with_state(|s| s.multi.register(key, service))
    }

    /// Iterate freshly constructed instances of every member registered
    /// under the key of `T`, in registration order.
    pub fn resolve_multi<T: Clone + Send + Sync + 'static>(&self) -> MultiResolve<'_, T> {
        let key = ServiceKey::of::<T>();
        let members = self.with_state(|s| s.multi.members(key));
        MultiResolve::new(self, members)
    }

    // ---- namespaces ----

    /// The namespace lookups currently target.
    pub fn namespace(&self) -> String {
        self.target_namespace(None)
    }

    /// Switch the current namespace, remembering the previous one.
    ///
    /// Only a single slot is remembered: entering a second nested scope
    /// loses the ability to restore two levels back.
    pub fn set_namespace(&self, namespace: &str) {
        self.with_state(|s| {
            s.previous_namespace = Some(std::mem::replace(
                &mut s.current_namespace,
                namespace.to_owned(),
            ));
        });
    }

    /// Enter `namespace` for the lifetime of the returned guard; dropping it
    /// restores the exact prior namespace, for one level of nesting.
    pub fn scoped(&self, namespace: &str) -> NamespaceScope<'_> {
        self.set_namespace(namespace);
        NamespaceScope { container: self }
    }

    fn exit_scope(&self) {
        self.with_state(|s| {
            if let Some(previous) = s.previous_namespace.take() {
                s.current_namespace = previous;
            }
        });
    }

    /// Install a callback overriding the current namespace for every lookup
    /// without an explicit namespace; returning `None` falls through to the
    /// current pointer.
    pub fn set_namespace_resolver(
        &self,
        resolver: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) {
        self.with_state(|s| s.namespace_resolver = Some(Arc::new(resolver)));
    }

    pub fn clear_namespace_resolver(&self) {
        self.with_state(|s| s.namespace_resolver = None);
    }

    // ---- diagnostics ----

    /// Resolve every registered `(namespace, key)` pair once, surfacing the
    /// first failure. Intended as a startup self-test.
    pub fn sanity_check(&self) -> Result<(), ContainerError> {
        let pairs = self.with_state(|s| s.store.entries());
        for (ns, key) in pairs {
            self.resolve_erased(key, Some(&ns))?;
        }
        Ok(())
    }
}

/// Guard restoring the previously current namespace on drop.
pub struct NamespaceScope<'c> {
    container: &'c ServiceContainer,
}

impl Drop for NamespaceScope<'_> {
    fn drop(&mut self) {
        self.container.exit_scope();
    }
}

static GLOBAL: Lazy<ServiceContainer> = Lazy::new(ServiceContainer::new);

/// The process-wide container instance.
pub fn global() -> &'static ServiceContainer {
    &GLOBAL
}

/// Shortcut for `global().register(...)`.
pub fn register(service: Constructible, namespace: Option<&str>) -> Result<(), ContainerError> {
    global().register(service, namespace)
}

/// Shortcut for `global().register_instance(...)`.
pub fn register_instance<T: Send + Sync + 'static>(
    value: T,
    namespace: Option<&str>,
) -> Result<(), ContainerError> {
    global().register_instance(value, namespace)
}

/// Shortcut for `global().resolve(...)`.
pub fn resolve<T: Clone + Send + Sync + 'static>(
    namespace: Option<&str>,
) -> Result<Option<T>, ContainerError> {
    global().resolve(namespace)
}

/// Shortcut for `global().multi_register(...)`.
pub fn multi_register<T: Send + Sync + 'static>(
    service: Constructible,
) -> Result<(), ContainerError> {
    global().multi_register::<T>(service)
}

/// Shortcut for `global().resolve_multi()`.
pub fn resolve_multi<T: Clone + Send + Sync + 'static>() -> MultiResolve<'static, T> {
    global().resolve_multi::<T>()
}
