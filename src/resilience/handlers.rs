//! Block and fallback handlers, and the table they are resolved from.
//!
//! Handlers are registered by name once at startup. Resource configs
//! reference them by name and are resolved against the table when the
//! descriptor is built, so a typo is a startup error and never a runtime
//! lookup failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::resilience::admission::BlockReason;
use crate::resilience::error::{BoxError, GuardError, HandlerPhase};

/// Result type produced by handlers.
pub type HandlerResult = Result<Value, BoxError>;

type BlockFn = dyn Fn(&CallArgs, BlockReason) -> HandlerResult + Send + Sync;
type FallbackFn = dyn Fn(&CallArgs, &(dyn std::error::Error + 'static)) -> HandlerResult + Send + Sync;

/// Positional arguments of a guarded call, kept for the handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs(Vec<Value>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    pub fn with(mut self, arg: impl Into<Value>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the argument at `index` as a hotkey value.
    ///
    /// Strings are used verbatim; other JSON values use their compact
    /// serialization. `null` and missing arguments yield `None`.
    pub fn hotkey(&self, index: usize) -> Option<String> {
        match self.0.get(index)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Vec<Value>> for CallArgs {
    fn from(args: Vec<Value>) -> Self {
        Self(args)
    }
}

/// Handler invoked when admission blocks a call.
#[derive(Clone)]
pub struct BlockHandler {
    name: Arc<str>,
    func: Arc<BlockFn>,
}

impl BlockHandler {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&CallArgs, BlockReason) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, args: &CallArgs, reason: BlockReason) -> HandlerResult {
        (self.func)(args, reason)
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for BlockHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlockHandler").field(&self.name).finish()
    }
}

/// Handler invoked when an admitted call fails.
#[derive(Clone)]
pub struct FallbackHandler {
    name: Arc<str>,
    func: Arc<FallbackFn>,
}

impl FallbackHandler {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&CallArgs, &(dyn std::error::Error + 'static)) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, args: &CallArgs, cause: &(dyn std::error::Error + 'static)) -> HandlerResult {
        (self.func)(args, cause)
    }

    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for FallbackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FallbackHandler").field(&self.name).finish()
    }
}

/// Named handlers available to resource configs.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    block: HashMap<String, BlockHandler>,
    fallback: HashMap<String, FallbackHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_block<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&CallArgs, BlockReason) -> HandlerResult + Send + Sync + 'static,
    {
        self.block.insert(name.to_string(), BlockHandler::new(name, func));
        self
    }

    pub fn register_fallback<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&CallArgs, &(dyn std::error::Error + 'static)) -> HandlerResult + Send + Sync + 'static,
    {
        self.fallback
            .insert(name.to_string(), FallbackHandler::new(name, func));
        self
    }

    /// Resolve a block handler for `resource`.
    pub fn block(&self, resource: &str, name: &str) -> Result<BlockHandler, GuardError> {
        self.block
            .get(name)
            .cloned()
            .ok_or_else(|| GuardError::UnknownHandler {
                resource: resource.to_string(),
                phase: HandlerPhase::Block,
                handler: name.to_string(),
            })
    }

    /// Resolve a fallback handler for `resource`.
    pub fn fallback(&self, resource: &str, name: &str) -> Result<FallbackHandler, GuardError> {
        self.fallback
            .get(name)
            .cloned()
            .ok_or_else(|| GuardError::UnknownHandler {
                resource: resource.to_string(),
                phase: HandlerPhase::Fallback,
                handler: name.to_string(),
            })
    }
}
