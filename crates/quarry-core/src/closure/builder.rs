use crate::{
    closure::{ArgRef, ClosureBody, ClosureId, Instruction, MethodRef},
    expr::{ArithOp, CompareOp},
    value::{Value, ValueType},
};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// Label
/// Forward-referencable branch target handed out by `ClosureBuilder`.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display("L{_0}")]
pub struct Label(usize);

///
/// BuildError
///

#[remain::sorted]
#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum BuildError {
    #[error("label {0} bound twice")]
    LabelRebound(Label),

    #[error("label {0} is referenced but never bound")]
    UnboundLabel(Label),
}

///
/// ClosureBuilder
///
/// Assembles a `ClosureBody`. Branches may name labels that are bound later;
/// targets are patched in `build`.
///

#[derive(Debug)]
pub struct ClosureBuilder {
    id: ClosureId,
    params: Vec<ValueType>,
    captures: Vec<ValueType>,
    returns: ValueType,
    code: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    patches: Vec<(usize, Label)>,
}

impl ClosureBuilder {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id: ClosureId(id),
            params: Vec::new(),
            captures: Vec::new(),
            returns: ValueType::Any,
            code: Vec::new(),
            labels: Vec::new(),
            patches: Vec::new(),
        }
    }

    //
    // Signature
    //

    #[must_use]
    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push(ty);
        self
    }

    #[must_use]
    pub fn capture(mut self, ty: ValueType) -> Self {
        self.captures.push(ty);
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = ty;
        self
    }

    //
    // Labels
    //

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn bind(&mut self, label: Label) -> Result<&mut Self, BuildError> {
        let slot = &mut self.labels[label.0];
        if slot.is_some() {
            return Err(BuildError::LabelRebound(label));
        }
        *slot = Some(self.code.len());

        Ok(self)
    }

    //
    // Instructions
    //

    pub fn emit(&mut self, insn: Instruction) -> &mut Self {
        self.code.push(insn);
        self
    }

    pub fn constant(&mut self, value: impl Into<Value>) -> &mut Self {
        self.emit(Instruction::Const(value.into()))
    }

    pub fn load_param(&mut self, index: usize) -> &mut Self {
        self.emit(Instruction::LoadParam(index))
    }

    pub fn load_capture(&mut self, index: usize) -> &mut Self {
        self.emit(Instruction::LoadCapture(index))
    }

    pub fn load(&mut self, slot: usize) -> &mut Self {
        self.emit(Instruction::Load(slot))
    }

    pub fn store(&mut self, slot: usize) -> &mut Self {
        self.emit(Instruction::Store(slot))
    }

    /// Zero-argument instance call, the shape of an entity getter.
    pub fn getter(&mut self, owner: &str, name: &str) -> &mut Self {
        self.emit(Instruction::Invoke(MethodRef::virtual_call(owner, name, 0)))
    }

    pub fn call(&mut self, owner: &str, name: &str, argc: usize) -> &mut Self {
        self.emit(Instruction::Invoke(MethodRef::virtual_call(owner, name, argc)))
    }

    pub fn call_static(&mut self, owner: &str, name: &str, argc: usize) -> &mut Self {
        self.emit(Instruction::Invoke(MethodRef::static_call(owner, name, argc)))
    }

    pub fn new_tuple(&mut self, arity: usize) -> &mut Self {
        self.emit(Instruction::NewTuple(arity))
    }

    pub fn make_closure(&mut self, body: ClosureBody, captures: Vec<ArgRef>) -> &mut Self {
        self.emit(Instruction::MakeClosure {
            body: Box::new(body),
            captures,
        })
    }

    pub fn arith(&mut self, op: ArithOp) -> &mut Self {
        self.emit(Instruction::Arith(op))
    }

    pub fn compare(&mut self, op: CompareOp) -> &mut Self {
        self.emit(Instruction::Compare(op))
    }

    pub fn if_zero(&mut self, op: CompareOp, label: Label) -> &mut Self {
        self.branch(Instruction::If { op, target: 0 }, label)
    }

    pub fn if_cmp(&mut self, op: CompareOp, label: Label) -> &mut Self {
        self.branch(Instruction::IfCmp { op, target: 0 }, label)
    }

    pub fn goto(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::Goto(0), label)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(Instruction::Return)
    }

    fn branch(&mut self, insn: Instruction, label: Label) -> &mut Self {
        self.patches.push((self.code.len(), label));
        self.emit(insn)
    }

    /// Patch branch targets and produce the body.
    pub fn build(self) -> Result<ClosureBody, BuildError> {
        let mut code = self.code;

        for (at, label) in self.patches {
            let target = self.labels[label.0].ok_or(BuildError::UnboundLabel(label))?;
            match &mut code[at] {
                Instruction::If { target: t, .. }
                | Instruction::IfCmp { target: t, .. }
                | Instruction::Goto(t) => *t = target,
                _ => unreachable!("patch recorded for a non-branch instruction"),
            }
        }

        Ok(ClosureBody {
            id: self.id,
            params: self.params,
            captures: self.captures,
            returns: self.returns,
            code,
        })
    }
}
