//! Function registry seam consulted by the resolver.
//!
//! The core never registers functions itself; the surrounding engine hands
//! the resolver a registry and the resolver asks it about every function
//! application it encounters. Only metadata lives here - evaluation is the
//! executor's business.

use std::collections::HashMap;

/// How a registered function behaves in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Row-at-a-time function usable in any expression
    Scalar,
    /// Aggregate over a group or window
    Aggregate,
    /// Stream-producing function usable as a FROM stream-like
    Stream,
}

/// Metadata for one registered function
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Required argument count; `None` accepts any arity
    pub arity: Option<usize>,
    pub kind: FunctionKind,
}

/// Lookup interface the resolver depends on
pub trait FunctionRegistry {
    /// Find a function by name and arity; `None` means not registered
    fn lookup(&self, name: &str, arity: usize) -> Option<&Function>;
}

/// Simple in-memory registry for tests, the REPL and embedding callers
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    functions: HashMap<String, Function>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the standard aggregates
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("count", None, FunctionKind::Aggregate);
        registry.register("sum", Some(1), FunctionKind::Aggregate);
        registry.register("avg", Some(1), FunctionKind::Aggregate);
        registry.register("min", Some(1), FunctionKind::Aggregate);
        registry.register("max", Some(1), FunctionKind::Aggregate);
        registry
    }

    /// Register or replace a function. Names are case-insensitive.
    pub fn register(&mut self, name: &str, arity: Option<usize>, kind: FunctionKind) {
        let key = name.to_ascii_lowercase();
        self.functions.insert(
            key.clone(),
            Function {
                name: key,
                arity,
                kind,
            },
        );
    }
}

impl FunctionRegistry for InMemoryRegistry {
    fn lookup(&self, name: &str, arity: usize) -> Option<&Function> {
        let f = self.functions.get(&name.to_ascii_lowercase())?;
        match f.arity {
            Some(required) if required != arity => None,
            _ => Some(f),
        }
    }
}
