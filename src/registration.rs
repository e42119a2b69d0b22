//! Deferred registration: builders applied at definition sites.
//!
//! [ServiceRegistration] captures key, namespace and arguments before the
//! constructible exists as a registered entry, then delegates to the global
//! container. Combined with [inventory], registrations can be declared next
//! to the type they register and installed in one pass at startup:
//!
//! ```ignore
//! inventory::submit! {
//!     DeferredRegistration {
//!         unit: module_path!(),
//!         register: || ServiceRegistration::new().apply(constructible!(dyn Logger: ConsoleLogger)),
//!     }
//! }
//! ```

use std::sync::Once;

use tracing::{debug, info, warn};

use crate::arguments::ServiceArguments;
use crate::construct::Constructible;
use crate::container::global;
use crate::store::ContainerError;

/// Builder capturing a registration before its constructible is applied.
#[derive(Default)]
pub struct ServiceRegistration {
    namespace: Option<String>,
    arguments: Option<ServiceArguments>,
}

impl ServiceRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Wrap the applied constructible with extra constructor arguments.
    pub fn with_arguments(mut self, arguments: ServiceArguments) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Register `service` under the captured namespace, wrapping it when
    /// arguments were captured.
    pub fn apply(&self, service: Constructible) -> Result<(), ContainerError> {
        let namespace = self.namespace.as_deref();
        debug!(
            service = service.service(),
            namespace = namespace.unwrap_or_default(),
            "applying service registration"
        );
        match &self.arguments {
            Some(arguments) => {
                global().register_wrapped(arguments.clone().for_service(service), namespace)
            }
            None => global().register(service, namespace),
        }
    }
}

/// A registration thunk collected at link time via [inventory].
pub struct DeferredRegistration {
    /// Where the registration was declared, for diagnostics.
    pub unit: &'static str,
    pub register: fn() -> Result<(), ContainerError>,
}

inventory::collect!(DeferredRegistration);

static INSTALL: Once = Once::new();

/// Run every collected [DeferredRegistration] exactly once per process.
///
/// Individual failures are logged and skipped so that one bad unit does not
/// block the rest.
pub fn install_registrations() {
    INSTALL.call_once(|| {
        info!("installing deferred service registrations");
        for registration in inventory::iter::<DeferredRegistration> {
            if let Err(err) = (registration.register)() {
                warn!(unit = registration.unit, %err, "skipping deferred registration");
            }
        }
    });
}
