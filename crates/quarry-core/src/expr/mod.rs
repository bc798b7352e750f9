//! Symbolic Expression Model.
//!
//! Nodes are immutable and reference counted; every node carries its
//! resolved semantic type. Rewrites always allocate new nodes, so a tree
//! embedded in one algebra value stays valid for every other value that
//! shares it.

mod ops;


pub use ops::{AggregateFn, ArithOp, BinaryOp, CompareOp, ScalarFn, UnaryOp};

use crate::{
    algebra::QueryAlgebra,
    closure::{CaptureCell, ClosureId},
    model::FieldRef,
    value::{Value, ValueType},
};
use derive_more::{Deref, Display};
use std::sync::Arc;

///
/// SourceId
///
/// Identity of one FROM source within an algebra chain. Aliases are only
/// assigned at render time, in source order.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("#{_0}")]
pub struct SourceId(pub u32);

impl SourceId {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

///
/// ElementScope
///
/// Which stream element a placeholder stands for. Each translated closure
/// gets its own scope, so inlining one element never touches another
/// closure's placeholder reached through a capture.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("e{_0}")]
pub struct ElementScope(pub u32);

///
/// BindingRef
///
/// Reference to one captured slot of one closure. Two references are the
/// same binding when they read the same capture cell; two occurrences of one
/// closure body with separately captured values stay distinct.
///

#[derive(Clone, Debug)]
pub struct BindingRef {
    pub closure: ClosureId,
    pub slot: usize,
    pub ty: ValueType,
    pub cell: CaptureCell,
}

impl PartialEq for BindingRef {
    fn eq(&self, other: &Self) -> bool {
        self.closure == other.closure
            && self.slot == other.slot
            && self.ty == other.ty
            && self.cell.same_cell(&other.cell)
    }
}

///
/// ExprKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Constant(Value),
    Param(BindingRef),
    /// The row bound to a FROM source.
    Row(SourceId),
    /// Placeholder for "the current stream element", replaced by inlining.
    Element(ElementScope),
    Path {
        base: Expr,
        field: FieldRef,
    },
    TupleGet {
        base: Expr,
        index: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    Conditional {
        cond: Expr,
        then: Expr,
        otherwise: Expr,
    },
    Tuple(Vec<Expr>),
    Call {
        func: ScalarFn,
        args: Vec<Expr>,
    },
    Aggregate {
        func: AggregateFn,
        arg: Option<Expr>,
        over: QueryAlgebra,
    },
    SubQuery(QueryAlgebra),
}

///
/// ExprNode
///

#[derive(Debug, PartialEq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: ValueType,
}

///
/// Expr
/// Shared handle to an immutable node.
///

#[derive(Clone, Debug, Deref, PartialEq)]
#[deref(forward)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind, ty: ValueType) -> Self {
        Self(Arc::new(ExprNode { kind, ty }))
    }

    //
    // Leaves
    //

    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.value_type();

        Self::new(ExprKind::Constant(value), ty)
    }

    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::constant(Value::Bool(value))
    }

    #[must_use]
    pub fn param(binding: BindingRef) -> Self {
        let ty = binding.ty.clone();

        Self::new(ExprKind::Param(binding), ty)
    }

    #[must_use]
    pub fn row(source: SourceId, ty: ValueType) -> Self {
        Self::new(ExprKind::Row(source), ty)
    }

    #[must_use]
    pub fn element(scope: ElementScope, ty: ValueType) -> Self {
        Self::new(ExprKind::Element(scope), ty)
    }

    //
    // Navigation
    //

    #[must_use]
    pub fn path(base: Self, field: FieldRef) -> Self {
        let ty = field.ty.clone();

        Self::new(ExprKind::Path { base, field }, ty)
    }

    #[must_use]
    pub fn tuple_get(base: Self, index: usize) -> Self {
        let ty = match &base.ty {
            ValueType::Tuple(items) => items.get(index).cloned().unwrap_or(ValueType::Any),
            _ => ValueType::Any,
        };

        Self::new(ExprKind::TupleGet { base, index }, ty)
    }

    //
    // Operators
    //

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        let ty = match op {
            UnaryOp::Not => ValueType::Bool,
            UnaryOp::Neg => operand.ty.clone(),
        };

        Self::new(ExprKind::Unary { op, operand }, ty)
    }

    #[must_use]
    pub fn not(operand: Self) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        let ty = match op {
            BinaryOp::Compare(_) | BinaryOp::And | BinaryOp::Or | BinaryOp::Like => {
                ValueType::Bool
            }
            BinaryOp::Concat => ValueType::Text,
            BinaryOp::Arith(_) => left.ty.widen(&right.ty).unwrap_or_else(|| left.ty.clone()),
        };

        Self::new(ExprKind::Binary { op, left, right }, ty)
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Compare(op), left, right)
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    #[must_use]
    pub fn conditional(cond: Self, then: Self, otherwise: Self) -> Self {
        let ty = match (&then.ty, &otherwise.ty) {
            (ValueType::Null, other) => other.clone(),
            (a, b) => a.widen(b).unwrap_or_else(|| a.clone()),
        };

        Self::new(
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            },
            ty,
        )
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        let ty = ValueType::Tuple(items.iter().map(|item| item.ty.clone()).collect());

        Self::new(ExprKind::Tuple(items), ty)
    }

    #[must_use]
    pub fn call(func: ScalarFn, args: Vec<Self>) -> Self {
        let ty = match func {
            ScalarFn::Abs => args.first().map_or(ValueType::Any, |arg| arg.ty.clone()),
            ScalarFn::Sqrt => ValueType::Double,
            ScalarFn::Lower | ScalarFn::Upper | ScalarFn::Trim => ValueType::Text,
            ScalarFn::Length => ValueType::Int,
        };

        Self::new(ExprKind::Call { func, args }, ty)
    }

    #[must_use]
    pub fn aggregate(func: AggregateFn, arg: Option<Self>, over: QueryAlgebra) -> Self {
        let arg_ty = arg.as_ref().map_or(ValueType::Any, |arg| arg.ty.clone());
        let ty = match func {
            AggregateFn::Count => ValueType::Long,
            AggregateFn::Sum if arg_ty == ValueType::Double => ValueType::Double,
            AggregateFn::Sum => ValueType::Long,
            AggregateFn::Avg => ValueType::Double,
            AggregateFn::Min | AggregateFn::Max => arg_ty,
        };

        Self::new(ExprKind::Aggregate { func, arg, over }, ty)
    }

    #[must_use]
    pub fn sub_query(query: QueryAlgebra) -> Self {
        let ty = ValueType::stream(query.row_type());

        Self::new(ExprKind::SubQuery(query), ty)
    }

    /// Same node kind under a different semantic type (widening, boxing).
    #[must_use]
    pub fn with_type(&self, ty: ValueType) -> Self {
        if self.ty == ty {
            return self.clone();
        }

        Self::new(self.kind.clone(), ty)
    }

    //
    // Inspection
    //

    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    #[must_use]
    pub fn ty(&self) -> &ValueType {
        &self.0.ty
    }

    #[must_use]
    pub fn as_constant(&self) -> Option<&Value> {
        match &self.0.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_constant().and_then(Value::as_bool)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Pre-order walk over this node and every node below it, not
    /// descending into nested queries.
    pub fn visit(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Direct child expressions, in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Param(_)
            | ExprKind::Row(_)
            | ExprKind::Element(_)
            | ExprKind::SubQuery(_) => Vec::new(),
            ExprKind::Path { base, .. } | ExprKind::TupleGet { base, .. } => vec![base],
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
            ExprKind::Tuple(items) | ExprKind::Call { args: items, .. } => items.iter().collect(),
            ExprKind::Aggregate { arg, .. } => arg.iter().collect(),
        }
    }

    /// Same node over replacement children, given in `children` order.
    /// Hands back `self` when every child is pointer-identical.
    #[must_use]
    pub fn with_children(&self, children: Vec<Self>) -> Self {
        let current = self.children();
        if current.len() == children.len()
            && current.iter().zip(&children).all(|(a, b)| a.ptr_eq(b))
        {
            return self.clone();
        }

        let kind = match (self.kind(), children.as_slice()) {
            (ExprKind::Path { field, .. }, [base]) => ExprKind::Path {
                base: base.clone(),
                field: field.clone(),
            },
            (ExprKind::TupleGet { index, .. }, [base]) => ExprKind::TupleGet {
                base: base.clone(),
                index: *index,
            },
            (ExprKind::Unary { op, .. }, [operand]) => ExprKind::Unary {
                op: *op,
                operand: operand.clone(),
            },
            (ExprKind::Binary { op, .. }, [left, right]) => ExprKind::Binary {
                op: *op,
                left: left.clone(),
                right: right.clone(),
            },
            (ExprKind::Conditional { .. }, [cond, then, otherwise]) => ExprKind::Conditional {
                cond: cond.clone(),
                then: then.clone(),
                otherwise: otherwise.clone(),
            },
            (ExprKind::Tuple(_), items) => return Self::tuple(items.to_vec()),
            (ExprKind::Call { func, .. }, args) => ExprKind::Call {
                func: *func,
                args: args.to_vec(),
            },
            (ExprKind::Aggregate { func, over, .. }, [arg]) => ExprKind::Aggregate {
                func: *func,
                arg: Some(arg.clone()),
                over: over.clone(),
            },
            _ => return self.clone(),
        };

        Self::new(kind, self.ty.clone())
    }

    /// Same node over a replacement nested query; only meaningful for
    /// `SubQuery` and `Aggregate`.
    #[must_use]
    pub fn with_query(&self, query: QueryAlgebra) -> Self {
        match self.kind() {
            ExprKind::SubQuery(current) if !current.ptr_eq(&query) => Self::sub_query(query),
            ExprKind::Aggregate { func, arg, over } if !over.ptr_eq(&query) => Self::new(
                ExprKind::Aggregate {
                    func: *func,
                    arg: arg.clone(),
                    over: query,
                },
                self.ty.clone(),
            ),
            _ => self.clone(),
        }
    }

    /// Nested query carried by this node, if any.
    #[must_use]
    pub fn nested_query(&self) -> Option<&QueryAlgebra> {
        match &self.0.kind {
            ExprKind::SubQuery(query) | ExprKind::Aggregate { over: query, .. } => Some(query),
            _ => None,
        }
    }
}
