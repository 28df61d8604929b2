//! Type identities used to key registrations and contracts.

use std::any::TypeId;
use std::fmt;

/// Identity of a Rust type, concrete or `dyn Trait`.
///
/// Equality and hashing use only the `TypeId`; the name is carried for
/// diagnostics.
///
/// # Examples
///
/// ```rust
/// use ferrous_host::TypeKey;
///
/// trait Echo: Send + Sync {}
///
/// let contract = TypeKey::of::<dyn Echo>();
/// assert!(contract.name().contains("Echo"));
/// assert_eq!(contract, TypeKey::of::<dyn Echo>());
/// assert_ne!(contract, TypeKey::of::<String>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, e.g. `EchoService`.
    pub fn short_name(&self) -> &'static str {
        let trimmed = self.name.trim_start_matches("dyn ");
        let base = trimmed.split('<').next().unwrap_or(trimmed);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Underlying `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Position of a registration inside the built registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub(crate) usize);

impl RegistrationId {
    /// Raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {}
    struct HelloService;

    #[test]
    fn short_name_strips_paths_and_dyn() {
        assert_eq!(TypeKey::of::<HelloService>().short_name(), "HelloService");
        assert_eq!(TypeKey::of::<dyn Greeter>().short_name(), "Greeter");
        assert_eq!(TypeKey::of::<Vec<u8>>().short_name(), "Vec");
    }
}
