//! Registered commands and method sets.
//!
//! The registry lives on the owning thread next to the interpreter. Each
//! entry is mirrored by a command in the interpreter's own table; the
//! command's deleter removes the registry entry again when script code
//! deletes the command (`rename name {}`), so the two never disagree about
//! which names are taken.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tether_script::{DeleteProc, Interp};
use tracing::{debug, trace, warn};

use crate::callable::{exposed_suffix, Callable, Method, MethodSet};
use crate::dispatch;
use crate::error::{EntryKind, Error, Result};

struct MethodSetEntry {
    id: u64,
    receiver_type: &'static str,
    // Keeps the receiver alive for as long as the namespace is registered.
    _receiver: Rc<dyn Any>,
    commands: Vec<String>,
}

#[derive(Default)]
pub(crate) struct Registry {
    commands: RefCell<HashMap<String, Rc<Callable>>>,
    method_sets: RefCell<HashMap<String, MethodSetEntry>>,
    next_set_id: Cell<u64>,
}

impl Registry {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn register_command(
        self: &Rc<Self>,
        interp: &Interp,
        name: &str,
        callable: Callable,
    ) -> Result<()> {
        callable.validate()?;
        if self.commands.borrow().contains_key(name) {
            return Err(Error::DuplicateRegistration {
                kind: EntryKind::Command,
                name: name.to_string(),
            });
        }

        let callable = Rc::new(callable);
        self.commands
            .borrow_mut()
            .insert(name.to_string(), callable.clone());
        let deleter = self.command_deleter(name, &callable);
        let arity = callable.arity();
        interp.create_command(
            name,
            dispatch::command_proc(name.to_string(), callable),
            Some(deleter),
        );
        debug!(command = %name, arity, "registered command");
        Ok(())
    }

    pub(crate) fn unregister_command(&self, interp: &Interp, name: &str) -> Result<()> {
        self.commands
            .borrow_mut()
            .remove(name)
            .ok_or_else(|| Error::NotFound {
                kind: EntryKind::Command,
                name: name.to_string(),
            })?;
        interp.delete_command(name)?;
        debug!(command = %name, "unregistered command");
        Ok(())
    }

    /// Register every exposed method of `R` as `namespace::Suffix`.
    ///
    /// All methods are checked before any command is installed.
    pub(crate) fn register_commands<R: MethodSet>(
        self: &Rc<Self>,
        interp: &Interp,
        namespace: &str,
        receiver: R,
    ) -> Result<()> {
        if self.method_sets.borrow().contains_key(namespace) {
            return Err(Error::DuplicateRegistration {
                kind: EntryKind::MethodSet,
                name: namespace.to_string(),
            });
        }

        let mut exposed: Vec<(String, Method<R>)> = Vec::new();
        for method in R::methods() {
            let Some(suffix) = exposed_suffix(method.name()) else {
                trace!(method = method.name(), "skipping unexposed method");
                continue;
            };
            let command = format!("{}::{}", namespace, suffix);
            method.validate()?;
            if let Some((_, other)) = exposed.iter().find(|(name, _)| *name == command) {
                return Err(Error::invalid_callable(format!(
                    "methods {} and {} both map to {}",
                    other.name(),
                    method.name(),
                    command
                )));
            }
            exposed.push((command, method));
        }

        let id = self.next_set_id.get() + 1;
        self.next_set_id.set(id);
        let receiver = Rc::new(receiver);
        let mut commands = Vec::with_capacity(exposed.len());
        for (command, method) in exposed {
            let deleter = self.method_deleter(namespace, id, &command);
            interp.create_command(
                &command,
                dispatch::method_proc(command.clone(), receiver.clone(), Rc::new(method)),
                Some(deleter),
            );
            commands.push(command);
        }

        debug!(
            namespace,
            receiver = type_name::<R>(),
            commands = commands.len(),
            "registered method set"
        );
        self.method_sets.borrow_mut().insert(
            namespace.to_string(),
            MethodSetEntry {
                id,
                receiver_type: type_name::<R>(),
                _receiver: receiver,
                commands,
            },
        );
        Ok(())
    }

    /// Remove every command of a method set.
    ///
    /// The namespace is dropped from the registry first. Every command is
    /// then deleted even if an earlier deletion fails; the first failure is
    /// returned.
    pub(crate) fn unregister_commands(&self, interp: &Interp, namespace: &str) -> Result<()> {
        let entry = self
            .method_sets
            .borrow_mut()
            .remove(namespace)
            .ok_or_else(|| Error::NotFound {
                kind: EntryKind::MethodSet,
                name: namespace.to_string(),
            })?;

        let mut first_error = None;
        for command in &entry.commands {
            if let Err(err) = interp.delete_command(command) {
                warn!(namespace, command = %command, error = %err, "failed to delete method command");
                first_error.get_or_insert(Error::from(err));
            }
        }
        debug!(namespace, receiver = entry.receiver_type, "unregistered method set");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn command_deleter(self: &Rc<Self>, name: &str, callable: &Rc<Callable>) -> DeleteProc {
        let registry: Weak<Self> = Rc::downgrade(self);
        let callable = Rc::downgrade(callable);
        let name = name.to_string();
        Box::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let mut commands = registry.commands.borrow_mut();
            // Only drop the entry this command was created for; the name may
            // have been registered again since.
            let same = commands
                .get(&name)
                .is_some_and(|current| Rc::as_ptr(current) == callable.as_ptr());
            if same {
                commands.remove(&name);
                debug!(command = %name, "command deleted by the runtime");
            }
        })
    }

    fn method_deleter(self: &Rc<Self>, namespace: &str, id: u64, command: &str) -> DeleteProc {
        let registry: Weak<Self> = Rc::downgrade(self);
        let namespace = namespace.to_string();
        let command = command.to_string();
        Box::new(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let mut method_sets = registry.method_sets.borrow_mut();
            if let Some(entry) = method_sets.get_mut(&namespace).filter(|entry| entry.id == id) {
                entry.commands.retain(|name| *name != command);
            }
        })
    }
}
