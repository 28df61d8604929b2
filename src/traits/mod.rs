//! Core traits for the dependency injection container.

mod dispose;
pub(crate) mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};
