//! Typed evaluation environment.
//!
//! An [`Environment`] is the set of names an expression may refer to:
//! declared variables, registered message schemas and function overloads,
//! plus the enabled extension libraries. It is assembled once per
//! configuration load through [`EnvironmentBuilder`], validated as a whole,
//! and then shared read-only behind an `Arc` by every program compiled
//! against it.

pub mod builtins;
pub mod lists;
pub mod stdlib;
pub mod strings;

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use strum_macros::Display;
use thiserror::Error;

use crate::analyzer::MacroOptions;
use crate::schema::{ATTRIBUTES_TYPE, REQUEST_TYPE, RESPONSE_TYPE, STRUCT_TYPE};
use crate::types::CelType;
use crate::value::{Fault, MessageValue, Value};

pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> Result<Value, Fault> + Send + Sync>;

/// Evaluation cost of a call beyond its own step, computed from the
/// arguments before the implementation runs.
pub type CostFn = Arc<dyn Fn(&[Value]) -> u64 + Send + Sync>;

/// Units charged for walking a value once: one per list element or map
/// entry and one per ten bytes of text.
pub fn traversal_cost(value: &Value) -> u64 {
    let units = match value {
        Value::String(s) => s.len().div_ceil(10),
        Value::Bytes(b) => b.len().div_ceil(10),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        _ => 0,
    };
    units as u64
}

/// Default call cost: one traversal of every argument.
pub fn arguments_cost(args: &[Value]) -> u64 {
    args.iter().map(traversal_cost).fold(0, u64::saturating_add)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),

    #[error("message '{0}' is registered more than once")]
    DuplicateMessage(String),

    #[error("overload '{overload}' of function '{function}' collides with an existing overload")]
    OverloadCollision { function: String, overload: String },

    #[error("{context} refers to unknown type '{type_name}'")]
    UnknownType { context: String, type_name: String },
}

pub type EnvironmentResult<T> = Result<T, EnvironmentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// An ordinary message with declared fields.
    Plain,
    /// `google.protobuf.Struct`: a free-form document that expressions see
    /// as `map(string, dyn)`.
    Struct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub name: String,
    pub fields: IndexMap<String, CelType>,
    pub kind: MessageKind,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            kind: MessageKind::Plain,
        }
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Struct,
            ..Self::new(name)
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: CelType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&CelType> {
        self.fields.get(name)
    }

    /// Value an unset field reads as.
    pub fn default_value(&self, field: &str) -> Value {
        match self.fields.get(field) {
            Some(ty) => default_for(ty),
            None => Value::Null,
        }
    }
}

fn default_for(ty: &CelType) -> Value {
    match ty {
        CelType::Bool => Value::Bool(false),
        CelType::Int => Value::Int(0),
        CelType::Uint => Value::Uint(0),
        CelType::Double => Value::Double(0.0),
        CelType::String => Value::String(String::new()),
        CelType::Bytes => Value::Bytes(Vec::new()),
        CelType::List(_) => Value::list(Vec::new()),
        CelType::Map(..) => Value::map(Default::default()),
        CelType::Message(name) => Value::message(MessageValue::new(name.clone())),
        _ => Value::Null,
    }
}

#[derive(Clone)]
pub struct Overload {
    pub id: String,
    /// Receiver-style (`x.f(y)`); the receiver is the first parameter.
    pub member: bool,
    pub params: Vec<CelType>,
    pub result: CelType,
    pub implementation: FunctionImpl,
    pub cost: CostFn,
}

impl Overload {
    pub fn global<F>(id: impl Into<String>, params: Vec<CelType>, result: CelType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            member: false,
            params,
            result,
            implementation: Arc::new(f),
            cost: Arc::new(arguments_cost),
        }
    }

    pub fn member<F>(id: impl Into<String>, params: Vec<CelType>, result: CelType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Fault> + Send + Sync + 'static,
    {
        Self {
            member: true,
            ..Self::global(id, params, result, f)
        }
    }

    /// Replaces the default argument-size cost.
    pub fn with_cost<C>(mut self, cost: C) -> Self
    where
        C: Fn(&[Value]) -> u64 + Send + Sync + 'static,
    {
        self.cost = Arc::new(cost);
        self
    }

    /// Runtime dispatch check against evaluated arguments.
    pub fn admits(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| p.admits(a))
    }

    fn signature_matches(&self, other: &Overload) -> bool {
        self.member == other.member && self.params == other.params
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("id", &self.id)
            .field("member", &self.member)
            .field("params", &self.params)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<Overload>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    pub fn find(&self, id: &str) -> Option<&Overload> {
        self.overloads.iter().find(|o| o.id == id)
    }
}

/// Optional extension libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Library {
    /// `cel.bind(name, init, body)`
    Bindings,
    Lists,
    Strings,
    TwoVarComprehensions,
}

#[derive(Debug, Clone)]
pub struct Environment {
    variables: IndexMap<String, CelType>,
    messages: IndexMap<String, MessageSchema>,
    functions: IndexMap<String, FunctionDecl>,
    libraries: IndexSet<Library>,
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    pub fn variable(&self, name: &str) -> Option<&CelType> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &CelType)> {
        self.variables.iter()
    }

    pub fn message(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    pub fn has_library(&self, library: Library) -> bool {
        self.libraries.contains(&library)
    }

    pub fn macro_options(&self) -> MacroOptions {
        MacroOptions {
            bindings: self.has_library(Library::Bindings),
            two_var_comprehensions: self.has_library(Library::TwoVarComprehensions),
        }
    }
}

/// Accumulates declarations. Conflicts are reported by [`build`](Self::build),
/// which checks the whole set at once.
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    variables: Vec<(String, CelType)>,
    messages: Vec<MessageSchema>,
    functions: Vec<FunctionDecl>,
    libraries: IndexSet<Library>,
}

impl EnvironmentBuilder {
    pub fn variable(mut self, name: impl Into<String>, ty: CelType) -> Self {
        self.variables.push((name.into(), ty));
        self
    }

    pub fn message(mut self, schema: MessageSchema) -> Self {
        self.messages.push(schema);
        self
    }

    pub fn function(mut self, decl: FunctionDecl) -> Self {
        self.functions.push(decl);
        self
    }

    pub fn library(mut self, library: Library) -> Self {
        self.libraries.insert(library);
        self
    }

    pub fn build(self) -> EnvironmentResult<Environment> {
        let mut messages = IndexMap::new();
        for schema in self.messages {
            if messages.contains_key(&schema.name) {
                return Err(EnvironmentError::DuplicateMessage(schema.name));
            }
            messages.insert(schema.name.clone(), schema);
        }

        let known = |ty: &CelType| first_unknown_type(ty, &messages);

        for schema in messages.values() {
            for (field, ty) in &schema.fields {
                if let Some(type_name) = known(ty) {
                    return Err(EnvironmentError::UnknownType {
                        context: format!("field '{}.{}'", schema.name, field),
                        type_name,
                    });
                }
            }
        }

        let mut variables = IndexMap::new();
        for (name, ty) in self.variables {
            if let Some(type_name) = known(&ty) {
                return Err(EnvironmentError::UnknownType {
                    context: format!("variable '{}'", name),
                    type_name,
                });
            }
            if variables.contains_key(&name) {
                return Err(EnvironmentError::DuplicateVariable(name));
            }
            variables.insert(name, ty);
        }

        let mut declared: Vec<FunctionDecl> = stdlib::functions();
        if self.libraries.contains(&Library::Strings) {
            declared.extend(strings::functions());
        }
        if self.libraries.contains(&Library::Lists) {
            declared.extend(lists::functions());
        }
        declared.extend(self.functions);

        let mut functions: IndexMap<String, FunctionDecl> = IndexMap::new();
        for decl in declared {
            let entry = functions
                .entry(decl.name.clone())
                .or_insert_with(|| FunctionDecl::new(decl.name.clone()));
            for overload in decl.overloads {
                let types = overload.params.iter().chain(std::iter::once(&overload.result));
                for ty in types {
                    if let Some(type_name) = known(ty) {
                        return Err(EnvironmentError::UnknownType {
                            context: format!("overload '{}'", overload.id),
                            type_name,
                        });
                    }
                }
                let collides = entry
                    .overloads
                    .iter()
                    .any(|o| o.id == overload.id || o.signature_matches(&overload));
                if collides {
                    return Err(EnvironmentError::OverloadCollision {
                        function: decl.name,
                        overload: overload.id,
                    });
                }
                entry.overloads.push(overload);
            }
        }

        Ok(Environment {
            variables,
            messages,
            functions,
            libraries: self.libraries,
        })
    }
}

fn first_unknown_type(ty: &CelType, messages: &IndexMap<String, MessageSchema>) -> Option<String> {
    match ty {
        CelType::Message(name) if !messages.contains_key(name) => Some(name.clone()),
        CelType::List(elem) => first_unknown_type(elem, messages),
        CelType::Map(k, v) => {
            first_unknown_type(k, messages).or_else(|| first_unknown_type(v, messages))
        }
        _ => None,
    }
}

/// The environment credential composer expressions are compiled against.
pub fn composer_environment() -> EnvironmentResult<Environment> {
    let claims = CelType::map(CelType::String, CelType::Dyn);
    Environment::builder()
        .message(MessageSchema::structure(STRUCT_TYPE))
        .message(MessageSchema::new(ATTRIBUTES_TYPE).field("claims", claims))
        .message(
            MessageSchema::new(REQUEST_TYPE)
                .field("spiffe_id", CelType::String)
                .field("attributes", CelType::message(ATTRIBUTES_TYPE)),
        )
        .message(
            MessageSchema::new(RESPONSE_TYPE).field("attributes", CelType::message(ATTRIBUTES_TYPE)),
        )
        .variable("trust_domain", CelType::String)
        .variable("spiffe_trust_domain", CelType::String)
        .variable("request", CelType::message(REQUEST_TYPE))
        .function(builtins::map_override_entries())
        .function(builtins::uuidgen())
        .library(Library::Bindings)
        .library(Library::Lists)
        .library(Library::Strings)
        .library(Library::TwoVarComprehensions)
        .build()
}
