//! The interpreter: command table, variables, result and event loop.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::builtins;
use crate::error::{Result, ScriptError};
use crate::event::{Event, Notifier};
use crate::obj::Obj;
use crate::parser::Parser;
use crate::photo::Photos;

/// Implementation of a command. Receives the full word list, command name
/// first, and returns the command's result.
pub type CommandProc = Rc<dyn Fn(&Interp, &[Obj]) -> Result<Obj>>;

/// Runs once when a command is removed from the interpreter, whether by
/// `delete_command`, `rename x {}`, replacement, or interpreter teardown.
pub type DeleteProc = Box<dyn FnOnce()>;

/// Maximum depth of nested evaluations (command substitution, `catch`).
const MAX_NESTING: usize = 256;

struct Command {
    proc: CommandProc,
    deleter: Option<DeleteProc>,
}

/// A single-threaded interpreter.
///
/// All state lives on the thread that created the interpreter; the type is
/// neither `Send` nor `Sync`. Other threads reach it only by queuing events
/// through a [`Notifier`].
pub struct Interp {
    commands: RefCell<HashMap<String, Command>>,
    vars: RefCell<HashMap<String, Obj>>,
    result: RefCell<Obj>,
    pub(crate) photos: Photos,
    depth: Cell<usize>,
    exit_requested: Cell<bool>,
    thread: ThreadId,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: RefCell<mpsc::UnboundedReceiver<Event>>,
}

pub(crate) struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl Interp {
    /// Create an interpreter owned by the calling thread, with the built-in
    /// commands installed.
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let interp = Self {
            commands: RefCell::new(HashMap::new()),
            vars: RefCell::new(HashMap::new()),
            result: RefCell::new(Obj::empty()),
            photos: Photos::default(),
            depth: Cell::new(0),
            exit_requested: Cell::new(false),
            thread: thread::current().id(),
            events_tx,
            events_rx: RefCell::new(events_rx),
        };
        builtins::install(&interp);
        interp
    }

    /// The thread this interpreter belongs to.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    // ==================== Evaluation ====================

    /// Evaluate a script.
    ///
    /// On success the interpreter result holds the value of the last command.
    /// On failure it holds the error message.
    pub fn eval(&self, script: &[u8]) -> Result<()> {
        match self.eval_script(script) {
            Ok(result) => {
                self.set_result(result);
                Ok(())
            }
            Err(err) => {
                self.set_result(Obj::from(err.message()));
                Err(err)
            }
        }
    }

    pub(crate) fn eval_script(&self, script: &[u8]) -> Result<Obj> {
        let _guard = self.enter()?;
        Parser::new(script).eval_commands(self, false)
    }

    pub(crate) fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            return Err(ScriptError::new(
                "too many nested evaluations (infinite loop?)",
            ));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard { depth: &self.depth })
    }

    pub(crate) fn invoke(&self, words: &[Obj]) -> Result<Obj> {
        let name = words[0].to_string_lossy();
        let proc = self
            .commands
            .borrow()
            .get(&name)
            .map(|command| command.proc.clone())
            .ok_or_else(|| ScriptError::new(format!("invalid command name \"{}\"", name)))?;
        trace!(command = %name, argc = words.len() - 1, "invoke");
        proc(self, words)
    }

    /// The result of the last evaluation.
    pub fn result(&self) -> Obj {
        self.result.borrow().clone()
    }

    pub fn set_result(&self, result: Obj) {
        *self.result.borrow_mut() = result;
    }

    // ==================== Variables ====================

    pub fn set_var(&self, name: &str, value: Obj) -> Result<Obj> {
        if name.ends_with(')') && name.contains('(') {
            return Err(ScriptError::new(format!(
                "can't set \"{}\": array variables are not supported",
                name
            )));
        }
        self.vars
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    pub fn get_var(&self, name: &str) -> Result<Obj> {
        self.vars.borrow().get(name).cloned().ok_or_else(|| {
            ScriptError::new(format!("can't read \"{}\": no such variable", name))
        })
    }

    pub fn var_exists(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    pub fn unset_var(&self, name: &str) -> Result<()> {
        self.vars
            .borrow_mut()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| {
                ScriptError::new(format!("can't unset \"{}\": no such variable", name))
            })
    }

    // ==================== Commands ====================

    /// Install a command, replacing any command of the same name.
    ///
    /// The replaced command's deleter runs after the new command is in place.
    pub fn create_command<F>(&self, name: &str, proc: F, deleter: Option<DeleteProc>)
    where
        F: Fn(&Interp, &[Obj]) -> Result<Obj> + 'static,
    {
        let previous = self.commands.borrow_mut().insert(
            name.to_string(),
            Command {
                proc: Rc::new(proc),
                deleter,
            },
        );
        debug!(command = %name, replaced = previous.is_some(), "command created");
        if let Some(Command {
            deleter: Some(deleter),
            ..
        }) = previous
        {
            deleter();
        }
    }

    /// Remove a command and run its deleter.
    pub fn delete_command(&self, name: &str) -> Result<()> {
        let command = self.commands.borrow_mut().remove(name).ok_or_else(|| {
            ScriptError::new(format!("can't delete \"{}\": command doesn't exist", name))
        })?;
        debug!(command = %name, "command deleted");
        if let Some(deleter) = command.deleter {
            deleter();
        }
        Ok(())
    }

    /// Move a command to a new name. An empty new name deletes it.
    pub fn rename_command(&self, old: &str, new: &str) -> Result<()> {
        if new.is_empty() {
            return self.delete_command(old);
        }
        let mut commands = self.commands.borrow_mut();
        if commands.contains_key(new) {
            return Err(ScriptError::new(format!(
                "can't rename to \"{}\": command already exists",
                new
            )));
        }
        let command = commands.remove(old).ok_or_else(|| {
            ScriptError::new(format!("can't rename \"{}\": command doesn't exist", old))
        })?;
        commands.insert(new.to_string(), command);
        Ok(())
    }

    pub fn command_exists(&self, name: &str) -> bool {
        self.commands.borrow().contains_key(name)
    }

    /// Names of all installed commands, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    // ==================== Event loop ====================

    /// A handle other threads can use to queue work for this interpreter.
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.events_tx.clone())
    }

    /// Ask the event loop to return once the current event finishes.
    pub fn request_exit(&self) {
        self.exit_requested.set(true);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.get()
    }

    /// Run queued events in arrival order until exit is requested.
    ///
    /// Blocks the calling thread while the queue is empty.
    pub fn run_event_loop(&self) {
        debug!("event loop running");
        while !self.exit_requested.get() {
            let event = self.events_rx.borrow_mut().blocking_recv();
            match event {
                Some(event) => event(self),
                None => break,
            }
        }
        debug!("event loop exited");
    }

    /// Run every event that is already queued without blocking. Returns the
    /// number of events processed.
    pub fn process_pending_events(&self) -> usize {
        let mut processed = 0;
        loop {
            let event = self.events_rx.borrow_mut().try_recv();
            match event {
                Ok(event) => {
                    event(self);
                    processed += 1;
                }
                Err(_) => return processed,
            }
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        let commands = std::mem::take(self.commands.get_mut());
        for (_, command) in commands {
            if let Some(deleter) = command.deleter {
                deleter();
            }
        }
    }
}
