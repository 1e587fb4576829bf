//! Expression syntax tree.
//!
//! The parser produces the tree with every `id` set to zero; macro expansion
//! rewrites macro calls into [`Comprehension`] and [`ExprKind::Bind`] nodes,
//! after which [`Expr::assign_ids`] numbers the nodes so that the checker can
//! attach overload resolutions to them.

use std::fmt;

use strum_macros::{AsRefStr, Display, EnumString};

use crate::tokenizer::literal::Literal;

pub type ExprId = u64;

/// Height limit for expression trees. Every later stage walks the tree
/// recursively, so deeper trees are rejected while parsing.
pub const MAX_EXPRESSION_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    /// Index of the first significant token of the expression.
    pub offset: usize,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    /// `operand.field`; with `test_only` set this is the presence test
    /// produced by `has(operand.field)`.
    Select {
        operand: Box<Expr>,
        field: String,
        test_only: bool,
    },
    /// A global call (`f(x)`) or a receiver call (`x.f(y)`).
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// Typed message construction, `pkg.Type{field: value}`.
    Struct {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Comprehension(Box<Comprehension>),
    /// `cel.bind(name, init, body)`
    Bind {
        name: String,
        init: Box<Expr>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
pub enum UnaryOperator {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
pub enum BinaryOperator {
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ComprehensionKind {
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "exists")]
    Exists,
    #[strum(serialize = "exists_one")]
    ExistsOne,
    #[strum(serialize = "map")]
    Map,
    #[strum(serialize = "filter")]
    Filter,
    #[strum(serialize = "transformList")]
    TransformList,
    #[strum(serialize = "transformMap")]
    TransformMap,
}

/// Iteration over a list or map.
///
/// With one variable it is bound to list elements or map keys. With two,
/// `var` is the list index or map key and `var2` the element or map value.
/// `body` is the predicate for the quantifiers and `filter`, and the
/// transform for the mapping kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    pub range: Expr,
    pub var: String,
    pub var2: Option<String>,
    pub filter: Option<Expr>,
    pub body: Expr,
}

impl Expr {
    pub fn new(offset: usize, kind: ExprKind) -> Self {
        Self { id: 0, offset, kind }
    }

    /// The dotted name spelled by an identifier or a chain of field selects,
    /// e.g. `lists.range` or `google.protobuf.Struct`.
    pub fn qualified_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Select {
                operand,
                field,
                test_only: false,
            } => operand
                .qualified_name()
                .map(|prefix| format!("{}.{}", prefix, field)),
            _ => None,
        }
    }

    /// Direct subexpressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Select { operand, .. } | ExprKind::Unary { operand, .. } => {
                vec![operand.as_ref()]
            }
            ExprKind::Call { target, args, .. } => {
                target.iter().map(|t| t.as_ref()).chain(args).collect()
            }
            ExprKind::Index { operand, index } => vec![operand.as_ref(), index.as_ref()],
            ExprKind::List(items) => items.iter().collect(),
            ExprKind::Map(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            ExprKind::Struct { fields, .. } => fields.iter().map(|(_, v)| v).collect(),
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => vec![condition.as_ref(), then.as_ref(), otherwise.as_ref()],
            ExprKind::Comprehension(c) => std::iter::once(&c.range)
                .chain(c.filter.as_ref())
                .chain(std::iter::once(&c.body))
                .collect(),
            ExprKind::Bind { init, body, .. } => vec![init.as_ref(), body.as_ref()],
        }
    }

    /// Height of the tree, a leaf being 1. Computed without recursion.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((expr, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(expr.children().into_iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    /// Numbers this node and its descendants in pre-order, starting at `next`.
    pub fn assign_ids(&mut self, next: &mut ExprId) {
        *next += 1;
        self.id = *next;
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => {}
            ExprKind::Select { operand, .. } => operand.assign_ids(next),
            ExprKind::Call { target, args, .. } => {
                if let Some(target) = target {
                    target.assign_ids(next);
                }
                args.iter_mut().for_each(|arg| arg.assign_ids(next));
            }
            ExprKind::Index { operand, index } => {
                operand.assign_ids(next);
                index.assign_ids(next);
            }
            ExprKind::List(items) => items.iter_mut().for_each(|item| item.assign_ids(next)),
            ExprKind::Map(entries) => entries.iter_mut().for_each(|(k, v)| {
                k.assign_ids(next);
                v.assign_ids(next);
            }),
            ExprKind::Struct { fields, .. } => {
                fields.iter_mut().for_each(|(_, v)| v.assign_ids(next))
            }
            ExprKind::Unary { operand, .. } => operand.assign_ids(next),
            ExprKind::Binary { left, right, .. } => {
                left.assign_ids(next);
                right.assign_ids(next);
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.assign_ids(next);
                then.assign_ids(next);
                otherwise.assign_ids(next);
            }
            ExprKind::Comprehension(c) => {
                c.range.assign_ids(next);
                if let Some(filter) = &mut c.filter {
                    filter.assign_ids(next);
                }
                c.body.assign_ids(next);
            }
            ExprKind::Bind { init, body, .. } => {
                init.assign_ids(next);
                body.assign_ids(next);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{}", lit),
            ExprKind::Ident(name) => write!(f, "{}", name),
            ExprKind::Select {
                operand,
                field,
                test_only: true,
            } => write!(f, "has({}.{})", operand, field),
            ExprKind::Select { operand, field, .. } => write!(f, "{}.{}", operand, field),
            ExprKind::Call {
                target,
                function,
                args,
            } => {
                if let Some(target) = target {
                    write!(f, "{}.", target)?;
                }
                write!(f, "{}(", function)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Index { operand, index } => write!(f, "{}[{}]", operand, index),
            ExprKind::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            ExprKind::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ExprKind::Struct { type_name, fields } => {
                write!(f, "{}{{", type_name)?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                write!(f, "}}")
            }
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op, operand),
            ExprKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
            ExprKind::Comprehension(c) => {
                write!(f, "{}.{}({}", c.range, c.kind, c.var)?;
                if let Some(var2) = &c.var2 {
                    write!(f, ", {}", var2)?;
                }
                if let Some(filter) = &c.filter {
                    write!(f, ", {}", filter)?;
                }
                write!(f, ", {})", c.body)
            }
            ExprKind::Bind { name, init, body } => {
                write!(f, "cel.bind({}, {}, {})", name, init, body)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
