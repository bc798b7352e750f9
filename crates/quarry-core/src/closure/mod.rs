//! Compiled closure format.
//!
//! A closure arrives as an instruction sequence for a small operand-stack
//! machine: no source text, no syntax tree. Bodies are plain data
//! (`Serialize`/`Deserialize`) so hosts can ship them pre-compiled; captured
//! values stay outside the body as deferred readers.

mod builder;


pub use builder::{BuildError, ClosureBuilder, Label};

use crate::{
    expr::{ArithOp, CompareOp},
    value::{Value, ValueType},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

///
/// ClosureId
/// Stable identity of one compiled closure body, used in diagnostics and bindings.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("lambda#{_0}")]
pub struct ClosureId(pub u64);

///
/// ArgRef
///
/// Reference to something a closure body reads from outside itself:
/// a declared lambda parameter or a captured slot.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum ArgRef {
    #[display("param {_0}")]
    Param(usize),
    #[display("capture {_0}")]
    Capture(usize),
}

///
/// MethodRef
/// Call target of an `Invoke` instruction.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    /// Argument count, excluding the receiver.
    pub argc: usize,
    pub is_static: bool,
}

impl MethodRef {
    #[must_use]
    pub fn virtual_call(owner: impl Into<String>, name: impl Into<String>, argc: usize) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            argc,
            is_static: false,
        }
    }

    #[must_use]
    pub fn static_call(owner: impl Into<String>, name: impl Into<String>, argc: usize) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            argc,
            is_static: true,
        }
    }

    /// Values popped from the operand stack by this call.
    #[must_use]
    pub const fn stack_arity(&self) -> usize {
        if self.is_static {
            self.argc
        } else {
            self.argc + 1
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.owner, self.name, self.argc)
    }
}

///
/// Instruction
///
/// Branch targets are absolute instruction indexes.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Instruction {
    Const(Value),
    LoadParam(usize),
    LoadCapture(usize),
    Load(usize),
    Store(usize),
    Dup,
    Pop,
    Invoke(MethodRef),
    NewTuple(usize),
    MakeClosure {
        body: Box<ClosureBody>,
        captures: Vec<ArgRef>,
    },
    Arith(ArithOp),
    Neg,
    Compare(CompareOp),
    Convert(ValueType),
    /// Jump when `top <op> 0` (or `false` for booleans) holds.
    If {
        op: CompareOp,
        target: usize,
    },
    /// Jump when `second <op> top` holds.
    IfCmp {
        op: CompareOp,
        target: usize,
    },
    Goto(usize),
    Return,
}

impl Instruction {
    #[must_use]
    pub const fn branch_target(&self) -> Option<usize> {
        match self {
            Self::If { target, .. } | Self::IfCmp { target, .. } | Self::Goto(target) => {
                Some(*target)
            }
            _ => None,
        }
    }
}

///
/// ClosureBody
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClosureBody {
    pub id: ClosureId,
    pub params: Vec<ValueType>,
    pub captures: Vec<ValueType>,
    pub returns: ValueType,
    pub code: Vec<Instruction>,
}

impl ClosureBody {
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.code
            .iter()
            .filter(|insn| matches!(insn, Instruction::If { .. } | Instruction::IfCmp { .. }))
            .count()
    }
}

///
/// CaptureCell
///
/// Deferred reader for one captured value. Literal cells are evaluated when
/// the closure is built; deferred cells read the variable each time the
/// binding is materialized.
///

#[derive(Clone)]
pub struct CaptureCell(Arc<dyn Fn() -> Value + Send + Sync>);

impl CaptureCell {
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();

        Self(Arc::new(move || value.clone()))
    }

    #[must_use]
    pub fn deferred(read: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(read))
    }

    #[must_use]
    pub fn read(&self) -> Value {
        (self.0)()
    }

    /// Whether both cells read the same captured variable.
    #[must_use]
    pub fn same_cell(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for CaptureCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaptureCell(..)")
    }
}

///
/// Closure
/// A compiled body paired with the runtime values it captured.
///

#[derive(Clone, Debug)]
pub struct Closure {
    pub body: Arc<ClosureBody>,
    pub captured: Vec<CaptureCell>,
}

impl Closure {
    #[must_use]
    pub fn new(body: ClosureBody) -> Self {
        Self {
            body: Arc::new(body),
            captured: Vec::new(),
        }
    }

    #[must_use]
    pub fn capturing(body: ClosureBody, captured: Vec<CaptureCell>) -> Self {
        Self {
            body: Arc::new(body),
            captured,
        }
    }

    #[must_use]
    pub fn id(&self) -> ClosureId {
        self.body.id
    }
}
