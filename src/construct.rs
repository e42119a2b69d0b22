//! Construction descriptors: what a service needs and how to build it.
//!
//! A [Constructible] replaces constructor reflection with an explicit,
//! statically declared dependency list: an ordered set of
//! `(parameter name, key)` pairs plus a closure invoking the real
//! constructor. The [constructible!] macro generates the descriptor from a
//! capability trait, a concrete type and its constructor signature.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::arguments::ArgumentBag;
use crate::store::{ContainerError, ServiceKey};

/// A freshly constructed, type-erased service value.
pub type BoxedService = Box<dyn Any + Send + Sync>;

type ConstructFn = Arc<dyn Fn(&ArgumentBag) -> Result<BoxedService, ContainerError> + Send + Sync>;

/// One declared constructor parameter: its name and the key satisfying it.
#[derive(Clone, Copy, Debug)]
pub struct Requirement {
    name: &'static str,
    key: ServiceKey,
}

impl Requirement {
    pub fn of<T: Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            key: ServiceKey::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }
}

/// A registered type descriptor: constructor plus declared dependencies.
#[derive(Clone)]
pub struct Constructible {
    service: &'static str,
    output: ServiceKey,
    requires: Vec<Requirement>,
    construct: ConstructFn,
}

impl Constructible {
    /// Describe a service producing values of type `S`.
    ///
    /// `service` is the concrete type name used in diagnostics, `requires`
    /// the declared dependency list in constructor order, and `construct`
    /// the closure invoking the constructor with a filled argument bag.
    pub fn describe<S: Send + Sync + 'static>(
        service: &'static str,
        requires: Vec<Requirement>,
        construct: impl Fn(&ArgumentBag) -> Result<BoxedService, ContainerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service,
            output: ServiceKey::of::<S>(),
            requires,
            construct: Arc::new(construct),
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// The capability key this descriptor produces.
    pub fn output(&self) -> ServiceKey {
        self.output
    }

    pub fn requires(&self) -> &[Requirement] {
        &self.requires
    }

    pub(crate) fn invoke(&self, args: &ArgumentBag) -> Result<BoxedService, ContainerError> {
        (self.construct)(args)
    }
}

impl fmt::Debug for Constructible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructible")
            .field("service", &self.service)
            .field("output", &self.output)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Describe a constructible service in one line.
///
/// The first form covers concrete types implementing [Default]:
///
/// ```ignore
/// constructible!(dyn Logger: ConsoleLogger)
/// ```
///
/// The second names the constructor and its parameters. Each parameter is
/// declared as `name: Type` and satisfied from the registry (by the key of
/// `Type`) or from caller-supplied arguments:
///
/// ```ignore
/// constructible!(dyn DateLogger: DateLoggerImpl, new, logger: Arc<dyn Logger>)
/// ```
///
/// The produced value is an `Arc<$Service>`; the coercion from the concrete
/// type is checked at compile time.
#[macro_export]
macro_rules! constructible {
    ($Service:ty : $Concrete:ty) => {
        $crate::constructible!($Service : $Concrete, default)
    };
    ($Service:ty : $Concrete:ty, $constructor:ident $(, $name:ident : $Dep:ty)* $(,)?) => {
        $crate::Constructible::describe::<::std::sync::Arc<$Service>>(
            ::std::any::type_name::<$Concrete>(),
            ::std::vec![
                $( $crate::Requirement::of::<$Dep>(::std::stringify!($name)) ),*
            ],
            |_args| {
                let service: ::std::sync::Arc<$Service> =
                    ::std::sync::Arc::new(<$Concrete>::$constructor(
                        $( _args.demand::<$Dep>(
                            ::std::any::type_name::<$Concrete>(),
                            ::std::stringify!($name),
                        )? ),*
                    ));
                ::std::result::Result::Ok(
                    ::std::boxed::Box::new(service) as $crate::BoxedService
                )
            },
        )
    };
}
