use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use tagforge_core::el::{ExpressionFactory, FaceletContext, Function};
use tagforge_core::{FaceletError, Location, Value};

use crate::MockExpressionFactory;

type FunctionLookup = dyn Fn(&str, &str) -> Option<Function>;

/// Evaluation context with fixed variables and recorded side effects.
pub struct MockContext {
    factory: Arc<MockExpressionFactory>,
    variables: HashMap<String, Value>,
    prefixes: HashMap<String, String>,
    functions: Vec<Box<FunctionLookup>>,
    composites: RefCell<Vec<Location>>,
    includes: RefCell<Vec<(String, Vec<(String, Value)>)>>,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::with_factory(Arc::new(MockExpressionFactory::new()))
    }
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context sharing `factory`, so counters survive across contexts.
    pub fn with_factory(factory: Arc<MockExpressionFactory>) -> Self {
        Self {
            factory,
            variables: HashMap::new(),
            prefixes: HashMap::new(),
            functions: Vec::new(),
            composites: RefCell::new(Vec::new()),
            includes: RefCell::new(Vec::new()),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Binds `prefix` to `namespace` for function calls such as `#{fn:upper(x)}`.
    pub fn with_namespace(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), namespace.into());
        self
    }

    /// Adds a lookup called with `(namespace, name)` when a function is resolved.
    pub fn with_functions<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str, &str) -> Option<Function> + 'static,
    {
        self.functions.push(Box::new(lookup));
        self
    }

    pub fn factory(&self) -> &Arc<MockExpressionFactory> {
        &self.factory
    }

    /// Locations of the composite components currently pushed.
    pub fn composite_stack(&self) -> Vec<Location> {
        self.composites.borrow().clone()
    }

    /// Every template included so far, with its parameters.
    pub fn includes(&self) -> Vec<(String, Vec<(String, Value)>)> {
        self.includes.borrow().clone()
    }
}

impl FaceletContext for MockContext {
    fn expression_factory(&self) -> &dyn ExpressionFactory {
        self.factory.as_ref()
    }

    fn resolve_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn resolve_function(&self, prefix: &str, name: &str) -> Option<Function> {
        let namespace = self.prefixes.get(prefix)?;
        self.functions.iter().find_map(|lookup| lookup(namespace, name))
    }

    fn push_composite_component(&self, location: &Location) -> bool {
        self.composites.borrow_mut().push(location.clone());
        true
    }

    fn pop_composite_component(&self) {
        self.composites.borrow_mut().pop();
    }

    fn include_template(&self, source: &str, params: &[(String, Value)]) -> Result<(), FaceletError> {
        self.includes.borrow_mut().push((source.to_owned(), params.to_vec()));
        Ok(())
    }
}
