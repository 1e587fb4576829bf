use std::collections::HashMap;

use crate::schema::ComposeWorkloadJwtSvidRequest;
use crate::value::Value;

/// Variable bindings visible to an evaluation. Comprehensions and
/// `cel.bind` push a child activation that shadows its parent.
#[derive(Debug, Default)]
pub struct Activation<'p> {
    variables: HashMap<String, Value>,
    parent: Option<&'p Activation<'p>>,
}

impl<'p> Activation<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: &'p Activation<'p>) -> Self {
        Self {
            variables: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.variables.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }
}

/// Per-request inputs of a credential composer expression.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub trust_domain: String,
    pub spiffe_trust_domain: String,
    pub request: Value,
}

impl EvaluationContext {
    pub fn new(
        trust_domain: impl Into<String>,
        spiffe_trust_domain: impl Into<String>,
        request: &ComposeWorkloadJwtSvidRequest,
    ) -> Self {
        Self {
            trust_domain: trust_domain.into(),
            spiffe_trust_domain: spiffe_trust_domain.into(),
            request: Value::from(request),
        }
    }

    pub fn activation(&self) -> Activation<'static> {
        Activation::new()
            .with_binding("trust_domain", Value::string(self.trust_domain.as_str()))
            .with_binding(
                "spiffe_trust_domain",
                Value::string(self.spiffe_trust_domain.as_str()),
            )
            .with_binding("request", self.request.clone())
    }
}
