//! Instancing policies.
//!
//! The host asks the policy installed for a contract whether a call can be
//! served by an existing instance context and, if not, has it initialize a
//! fresh one. The three policies differ only in what "existing" means and in
//! which scope the context resolves from:
//!
//! | policy     | existing context        | scope                  |
//! |------------|-------------------------|------------------------|
//! | Singleton  | the process-wide one    | root                   |
//! | PerSession | the channel's, if any   | child, one per channel |
//! | PerCall    | never                   | child, one per call    |

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::behavior::InstanceContextMode;
use super::binding::{BindingScope, ContextBinding, IdleCallback};
use super::channel::Channel;
use super::dispatch::Message;
use super::instance_context::InstanceContext;
use super::lifecycle::CommunicationState;
use crate::error::{HostError, HostResult};
use crate::key::RegistrationId;
use crate::provider::ServiceProvider;

/// Instance-context hooks the host calls for every message.
///
/// Hooks may be called concurrently from any dispatch thread.
pub trait InstanceContextProvider: Send + Sync {
    /// Instancing mode this provider implements
    fn mode(&self) -> InstanceContextMode;

    /// Context that should serve `message`, or `None` if the host must create
    /// one and call [`initialize_instance_context`](Self::initialize_instance_context).
    fn get_existing_instance_context(
        &self,
        message: &Message,
        channel: &Arc<dyn Channel>,
    ) -> HostResult<Option<Arc<InstanceContext>>>;

    /// Prepares a context the host just created for `message`.
    fn initialize_instance_context(
        &self,
        context: &Arc<InstanceContext>,
        message: &Message,
        channel: &Arc<dyn Channel>,
    ) -> HostResult<()>;

    /// True when the host may reclaim `context`.
    fn is_idle(&self, context: &InstanceContext) -> HostResult<bool>;

    /// Asks to be called back once `context` becomes idle.
    fn notify_idle(&self, context: &InstanceContext, callback: IdleCallback) -> HostResult<()>;

    /// Called when the host closes. Contexts that live as long as the host
    /// are closed here; the default does nothing.
    fn shutdown(&self) {}
}

fn binding_of(context: &InstanceContext) -> HostResult<&Arc<ContextBinding>> {
    context
        .binding()
        .ok_or(HostError::Consistency("instance context was never initialized"))
}

/// One context, one object, one resolution for the whole process.
pub struct SingletonPolicy {
    provider: ServiceProvider,
    registration: RegistrationId,
    context: OnceCell<Arc<InstanceContext>>,
}

impl SingletonPolicy {
    pub fn new(provider: ServiceProvider, registration: RegistrationId) -> Self {
        Self {
            provider,
            registration,
            context: OnceCell::new(),
        }
    }

    /// The shared context, if it has been created
    pub fn context(&self) -> Option<&Arc<InstanceContext>> {
        self.context.get()
    }

    fn create_context(&self) -> HostResult<Arc<InstanceContext>> {
        let instance = self.provider.resolve_component(self.registration, &[])?;
        let context = InstanceContext::with_instance(instance);
        ContextBinding::bind(&context, BindingScope::Root(self.provider.clone()), None)?;
        tracing::debug!(
            context = context.id(),
            registration = %self.registration,
            "singleton instance context created"
        );
        Ok(context)
    }
}

impl InstanceContextProvider for SingletonPolicy {
    fn mode(&self) -> InstanceContextMode {
        InstanceContextMode::Single
    }

    fn get_existing_instance_context(
        &self,
        _message: &Message,
        _channel: &Arc<dyn Channel>,
    ) -> HostResult<Option<Arc<InstanceContext>>> {
        // Losers of the first-access race block until the winner finishes;
        // a failed resolution leaves the cell empty for the next caller.
        let context = self.context.get_or_try_init(|| self.create_context())?;
        Ok(Some(context.clone()))
    }

    fn initialize_instance_context(
        &self,
        _context: &Arc<InstanceContext>,
        _message: &Message,
        _channel: &Arc<dyn Channel>,
    ) -> HostResult<()> {
        Ok(())
    }

    fn is_idle(&self, context: &InstanceContext) -> HostResult<bool> {
        Ok(context.state() != CommunicationState::Opened)
    }

    fn notify_idle(&self, context: &InstanceContext, callback: IdleCallback) -> HostResult<()> {
        binding_of(context)?.on_idle(callback);
        Ok(())
    }

    fn shutdown(&self) {
        if let Some(context) = self.context.get() {
            if context.state() == CommunicationState::Opened {
                tracing::debug!(context = context.id(), "closing singleton instance context");
                context.close();
            }
        }
    }
}

impl fmt::Debug for SingletonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonPolicy")
            .field("registration", &self.registration)
            .field("context", &self.context.get().map(|c| c.id()))
            .finish()
    }
}

/// One context and one child scope per channel.
#[derive(Debug)]
pub struct PerSessionPolicy {
    provider: ServiceProvider,
}

impl PerSessionPolicy {
    pub fn new(provider: ServiceProvider) -> Self {
        Self { provider }
    }
}

impl InstanceContextProvider for PerSessionPolicy {
    fn mode(&self) -> InstanceContextMode {
        InstanceContextMode::PerSession
    }

    fn get_existing_instance_context(
        &self,
        _message: &Message,
        channel: &Arc<dyn Channel>,
    ) -> HostResult<Option<Arc<InstanceContext>>> {
        Ok(channel.session_slot().get())
    }

    fn initialize_instance_context(
        &self,
        context: &Arc<InstanceContext>,
        _message: &Message,
        channel: &Arc<dyn Channel>,
    ) -> HostResult<()> {
        let scope = self.provider.begin_scope();
        ContextBinding::bind(context, BindingScope::Owned(scope), Some(channel))?;
        channel.session_slot().attach(context.clone())
    }

    fn is_idle(&self, context: &InstanceContext) -> HostResult<bool> {
        let binding = binding_of(context)?;
        Ok(binding
            .channel()
            .map_or(true, |channel| channel.state() != CommunicationState::Opened))
    }

    fn notify_idle(&self, context: &InstanceContext, callback: IdleCallback) -> HostResult<()> {
        binding_of(context)?.on_idle(callback);
        Ok(())
    }
}

/// A fresh context and child scope for every call.
#[derive(Debug)]
pub struct PerCallPolicy {
    provider: ServiceProvider,
}

impl PerCallPolicy {
    pub fn new(provider: ServiceProvider) -> Self {
        Self { provider }
    }
}

impl InstanceContextProvider for PerCallPolicy {
    fn mode(&self) -> InstanceContextMode {
        InstanceContextMode::PerCall
    }

    fn get_existing_instance_context(
        &self,
        _message: &Message,
        _channel: &Arc<dyn Channel>,
    ) -> HostResult<Option<Arc<InstanceContext>>> {
        Ok(None)
    }

    fn initialize_instance_context(
        &self,
        context: &Arc<InstanceContext>,
        _message: &Message,
        channel: &Arc<dyn Channel>,
    ) -> HostResult<()> {
        let scope = self.provider.begin_scope();
        ContextBinding::bind(context, BindingScope::Owned(scope), Some(channel))?;
        Ok(())
    }

    fn is_idle(&self, _context: &InstanceContext) -> HostResult<bool> {
        Ok(true)
    }

    fn notify_idle(&self, _context: &InstanceContext, _callback: IdleCallback) -> HostResult<()> {
        Ok(())
    }
}

/// Policy implementing `mode` for `registration`.
pub fn policy_for(
    mode: InstanceContextMode,
    provider: &ServiceProvider,
    registration: RegistrationId,
) -> Arc<dyn InstanceContextProvider> {
    match mode {
        InstanceContextMode::Single => Arc::new(SingletonPolicy::new(provider.clone(), registration)),
        InstanceContextMode::PerSession => Arc::new(PerSessionPolicy::new(provider.clone())),
        InstanceContextMode::PerCall => Arc::new(PerCallPolicy::new(provider.clone())),
    }
}
