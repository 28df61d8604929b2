use std::fmt;

use crate::key::TypeKey;

/// Namespace given to contracts that do not name one.
pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

/// A service contract: the join key between registrations and endpoints.
///
/// Identified on the wire by name and namespace, and in configuration by
/// its configuration name. Duplex contracts name a callback contract.
///
/// ```
/// use ferrous_host::ContractDescription;
///
/// trait Chat: Send + Sync {}
/// trait ChatCallback: Send + Sync {}
///
/// let chat = ContractDescription::of::<dyn Chat>().with_callback::<dyn ChatCallback>();
/// assert_eq!(chat.name(), "Chat");
/// assert_eq!(chat.namespace(), "http://tempuri.org/");
/// assert!(chat.is_duplex());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContractDescription {
    name: String,
    namespace: String,
    configuration_name: String,
    contract_type: TypeKey,
    callback_contract: Option<TypeKey>,
}

impl ContractDescription {
    /// Contract for trait object type `C`, named after the trait.
    pub fn of<C: ?Sized + 'static>() -> Self {
        let contract_type = TypeKey::of::<C>();
        let name = contract_type.short_name().to_string();
        Self {
            configuration_name: name.clone(),
            name,
            namespace: DEFAULT_NAMESPACE.to_string(),
            contract_type,
            callback_contract: None,
        }
    }

    /// Overrides the wire name and namespace.
    pub fn named(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.name = name.into();
        self.namespace = namespace.into();
        self
    }

    /// Overrides the configuration name (defaults to the trait name).
    pub fn with_configuration_name(mut self, configuration_name: impl Into<String>) -> Self {
        self.configuration_name = configuration_name.into();
        self
    }

    /// Makes this a duplex contract calling back through `CB`.
    pub fn with_callback<CB: ?Sized + 'static>(mut self) -> Self {
        self.callback_contract = Some(TypeKey::of::<CB>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }

    pub fn contract_type(&self) -> TypeKey {
        self.contract_type
    }

    pub fn callback_contract(&self) -> Option<TypeKey> {
        self.callback_contract
    }

    /// True when the contract has a callback contract.
    pub fn is_duplex(&self) -> bool {
        self.callback_contract.is_some()
    }
}

impl fmt::Debug for ContractDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ContractDescription");
        s.field("name", &self.name).field("namespace", &self.namespace);
        if let Some(callback) = &self.callback_contract {
            s.field("callback", callback);
        }
        s.finish()
    }
}

impl fmt::Display for ContractDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace, self.name)
    }
}
