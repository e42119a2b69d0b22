//! Runtime service registry with namespace-scoped registration and recursive
//! construction of declared dependencies.
//!
//! # Simple use case
//!
//! ```
//! use std::sync::Arc;
//! use vivarium::{constructible, ServiceContainer};
//!
//! // Define capability traits and implementors
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! trait Host: Send + Sync {
//!     fn welcome(&self) -> String;
//! }
//!
//! #[derive(Default)]
//! struct PlainGreeter;
//!
//! impl Greeter for PlainGreeter {
//!     fn greet(&self) -> String {
//!         "Go A!".to_owned()
//!     }
//! }
//!
//! struct GreetingHost {
//!     greeter: Arc<dyn Greeter>,
//! }
//!
//! impl GreetingHost {
//!     fn new(greeter: Arc<dyn Greeter>) -> Self {
//!         Self { greeter }
//!     }
//! }
//!
//! impl Host for GreetingHost {
//!     fn welcome(&self) -> String {
//!         format!("{} Go B!", self.greeter.greet())
//!     }
//! }
//!
//! # fn main() -> Result<(), vivarium::ContainerError> {
//! let container = ServiceContainer::new();
//!
//! // Registration order does not matter under the default lazy policy.
//! container.register(
//!     constructible!(dyn Host: GreetingHost, new, greeter: Arc<dyn Greeter>),
//!     None,
//! )?;
//! container.register(constructible!(dyn Greeter: PlainGreeter), None)?;
//!
//! let host: Arc<dyn Host> = container.resolve(None)?.expect("host is registered");
//! assert_eq!(host.welcome(), "Go A! Go B!");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Services are registered against a [ServiceKey], the type of the resolved
//! value (typically an ```Arc<dyn Capability>``` trait object), inside a
//! namespace. Each entry is an [Entry]: an already-built instance, a
//! [Constructible] descriptor, or a descriptor wrapped with extra
//! constructor arguments ([ServiceArguments]).
//!
//! Resolution looks the entry up, unwraps any argument wrapper, and, when
//! the entry is still a descriptor, hands it to the construction engine,
//! which satisfies the descriptor's declared [Requirement] list recursively
//! from the same container and then invokes the constructor. Under the
//! default lazy policy this happens at every resolve; under the eager policy
//! it happens once, at registration time.
//!
//! A parallel, non-namespaced multi-registry supports one-to-many
//! registration under a single key, resolved as a sequence of freshly
//! constructed instances ([MultiResolve]).
//!
//! A process-wide container is available through [global()] together with
//! free-function shortcuts, and [ServiceRegistration] plus
//! [install_registrations] let registrations be declared next to the types
//! they register and installed in one pass at startup.

mod arguments;
mod construct;
mod container;
mod multi;
mod registration;
mod store;

pub use arguments::{ArgumentBag, ProvideArguments, ServiceArguments, WrapTarget};
pub use construct::{BoxedService, Constructible, Requirement};
pub use container::{
    global, multi_register, register, register_instance, resolve, resolve_multi, NamespaceScope,
    ServiceContainer,
};
pub use multi::MultiResolve;
pub use registration::{install_registrations, DeferredRegistration, ServiceRegistration};
pub use store::{ContainerError, Entry, ServiceKey, SharedInstance, DEFAULT_NAMESPACE};
