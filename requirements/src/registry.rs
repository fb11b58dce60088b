//! Command Registry (component C5): dispatches a [`Requirement`] to its
//! handler by [`CommandKind`], built once at construction time rather than
//! resolved dynamically by stringified enum name.

use crate::{CommandKind, Error, Requirement};
use std::collections::HashMap;

/// A command handler. `Ctx` is supplied by the caller — this crate stays
/// agnostic of what a handler needs to reach (catalog, player, playlists);
/// the automation crate's shared state fills that role.
pub type Handler<Ctx> = Box<dyn Fn(&Ctx, i64, &Requirement) + Send + Sync>;

/// Explicit, construction-time map from [`CommandKind`] to [`Handler`].
pub struct CommandRegistry<Ctx> {
    handlers: HashMap<CommandKind, Handler<Ctx>>,
}

impl<Ctx> Default for CommandRegistry<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<Ctx> CommandRegistry<Ctx> {
    /// Constructs an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for `kind`.
    pub fn register(
        &mut self,
        kind: CommandKind,
        handler: impl Fn(&Ctx, i64, &Requirement) + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    /// Asserts every [`CommandKind`] variant has a registered handler.
    ///
    /// # Errors
    /// Returns [`Error::MissingHandler`] naming the first unhandled variant.
    pub fn check_validity(&self) -> Result<(), Error> {
        for kind in CommandKind::all() {
            if !self.handlers.contains_key(kind) {
                return Err(Error::MissingHandler(*kind));
            }
        }
        Ok(())
    }

    /// Dispatches `requirement` to its handler, if one is registered.
    pub fn dispatch(&self, ctx: &Ctx, deadline: i64, requirement: &Requirement) {
        if let Some(handler) = self.handlers.get(&requirement.kind) {
            handler(ctx, deadline, requirement);
        } else {
            tracing::error!(kind = ?requirement.kind, "no handler registered for command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CommandRegistry;
    use crate::{CommandKind, Requirement, TimeSpecification};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn req(kind: CommandKind) -> Requirement {
        Requirement {
            kind,
            payload: Vec::new(),
            target_name: None,
            when: TimeSpecification::default(),
            reboot: false,
            internal_time_advance: 1,
        }
    }

    #[test]
    fn check_validity_fails_until_every_kind_is_registered() {
        let mut registry: CommandRegistry<()> = CommandRegistry::new();
        assert!(registry.check_validity().is_err());
        for kind in CommandKind::all() {
            registry.register(*kind, |(), _, _| {});
        }
        assert!(registry.check_validity().is_ok());
    }

    #[test]
    fn dispatch_invokes_the_registered_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry: CommandRegistry<()> = CommandRegistry::new();
        let calls_for_handler = Arc::clone(&calls);
        registry.register(CommandKind::NoOp, move |(), _, _| {
            calls_for_handler.fetch_add(1, Ordering::SeqCst);
        });
        registry.dispatch(&(), 0, &req(CommandKind::NoOp));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_on_unregistered_kind_does_not_panic() {
        let registry: CommandRegistry<()> = CommandRegistry::new();
        registry.dispatch(&(), 0, &req(CommandKind::PlayFiles));
    }
}
