//! # Component Module
//!
//! Controllers, models and services are application-defined component
//! classes. A class is declared once at boot with a constructor and a method
//! table, registered in the [`Registries`](crate::registry::Registries) under
//! its own name, and instantiated lazily per request by the
//! [`BundleResolver`](crate::resolver::BundleResolver).
//!
//! ```rust
//! use bundlerouter::component::{ComponentClass, ComponentKind};
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let class = ComponentClass::builder(ComponentKind::Controller, "Greeter", |_bundle| {
//!     Ok(Greeter { greeting: "hello".to_string() })
//! })
//! .method("hello", |greeter: &Greeter, instance| {
//!     instance.response().ok(greeter.greeting.as_str());
//!     Ok(())
//! })
//! .build();
//!
//! assert_eq!(class.name(), "Greeter");
//! ```

mod class;
mod instance;

pub use class::{ComponentClass, ComponentClassBuilder, ComponentKind};
pub use instance::Instance;
