//! Symbolic Evaluator.
//!
//! Executes a closure body over an abstract operand stack whose slots hold
//! expression nodes instead of values. Every conditional branch is forked:
//! both successors run to `Return` independently and the two results are
//! joined under a `Conditional` node, so a boolean closure with an if/else
//! yields one expression. Only forward jumps are accepted.

mod calls;
mod frame;


use crate::{
    algebra::QueryAlgebra,
    closure::{ArgRef, Closure, ClosureBody, Instruction},
    config::TranslatorConfig,
    error::TranslateError,
    expr::{ArithOp, CompareOp, Expr, ExprKind, SourceId, UnaryOp},
    handler::{ArgumentHandler, HandlerChain, HandlerError, HandlerId},
    model::MetadataProvider,
    rewrite,
    value::{Value, ValueType},
};
use frame::{Frame, PendingClosure, StackItem};

///
/// Environment
/// Read-only collaborators shared by every closure of one translation.
///

#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub metadata: &'a dyn MetadataProvider,
    pub config: &'a TranslatorConfig,
}

/// Translate `closure` into one expression, resolving its parameters and
/// captures through `chain` starting at `head`. Stream sources created while
/// evaluating draw their ids from `next_source`.
pub fn translate(
    closure: &Closure,
    chain: &mut HandlerChain,
    head: HandlerId,
    env: Environment<'_>,
    next_source: &mut SourceId,
) -> Result<Expr, TranslateError> {
    let body = closure.body.as_ref();
    tracing::trace!(
        closure = %body.id,
        instructions = body.code.len(),
        branches = body.branch_count(),
        "translating closure"
    );

    let result = Evaluator::new(body, chain, head, env, next_source).evaluate();
    if let Err(err) = &result {
        tracing::debug!(closure = %body.id, class = %err.class(), error = %err, "closure translation failed");
    }

    result
}

///
/// Evaluator
///

struct Evaluator<'b, 'h, 'a> {
    body: &'b ClosureBody,
    chain: &'h mut HandlerChain,
    head: HandlerId,
    env: Environment<'a>,
    next_source: &'h mut SourceId,
    forks: usize,
    steps: usize,
}

impl<'b, 'h, 'a> Evaluator<'b, 'h, 'a> {
    const fn new(
        body: &'b ClosureBody,
        chain: &'h mut HandlerChain,
        head: HandlerId,
        env: Environment<'a>,
        next_source: &'h mut SourceId,
    ) -> Self {
        Self {
            body,
            chain,
            head,
            env,
            next_source,
            forks: 0,
            steps: 0,
        }
    }

    fn evaluate(&mut self) -> Result<Expr, TranslateError> {
        let expr = self.run(0, Frame::default())?;

        Ok(rewrite::simplify(&expr))
    }

    fn run(&mut self, mut pc: usize, mut frame: Frame<'b>) -> Result<Expr, TranslateError> {
        let body = self.body;

        loop {
            self.steps += 1;
            if self.steps > self.env.config.max_steps {
                return Err(self.irreducible(
                    pc,
                    format!("more than {} instructions evaluated", self.env.config.max_steps),
                ));
            }
            let Some(insn) = body.code.get(pc) else {
                return Err(self.irreducible(pc, "control reaches the end of the body"));
            };

            match insn {
                Instruction::Const(value) => frame.push_value(Expr::constant(value.clone())),
                Instruction::LoadParam(index) => {
                    let expr = self.load_param(*index)?;
                    frame.push_value(expr);
                }
                Instruction::LoadCapture(slot) => {
                    let expr = self.load_capture(*slot)?;
                    frame.push_value(expr);
                }
                Instruction::Load(slot) => {
                    self.check_local(pc, *slot)?;
                    let item = frame
                        .load(*slot)
                        .cloned()
                        .ok_or_else(|| self.unsupported(pc, format!("read of unassigned local {slot}")))?;
                    frame.push(item);
                }
                Instruction::Store(slot) => {
                    self.check_local(pc, *slot)?;
                    let item = self.pop(pc, &mut frame)?;
                    frame.store(*slot, item);
                }
                Instruction::Dup => {
                    let item = frame.peek().cloned().ok_or_else(|| self.underflow(pc))?;
                    frame.push(item);
                }
                Instruction::Pop => {
                    self.pop(pc, &mut frame)?;
                }
                Instruction::Invoke(method) => {
                    let args = frame
                        .pop_many(method.stack_arity())
                        .ok_or_else(|| self.underflow(pc))?;
                    let result = self.invoke(pc, method, args)?;
                    frame.push(result);
                }
                Instruction::NewTuple(arity) => {
                    let tuple = self.new_tuple(pc, *arity, &mut frame)?;
                    frame.push_value(tuple);
                }
                Instruction::MakeClosure { body, captures } => {
                    frame.push(StackItem::Closure(PendingClosure {
                        body,
                        forwards: captures,
                        creator: self.head,
                    }));
                }
                Instruction::Arith(op) => {
                    let right = self.pop_value(pc, &mut frame)?;
                    let left = self.pop_value(pc, &mut frame)?;
                    frame.push_value(self.arith(pc, *op, left, right)?);
                }
                Instruction::Neg => {
                    let operand = self.pop_value(pc, &mut frame)?;
                    if !operand.ty.is_numeric() {
                        return Err(self.unsupported(pc, format!("negation of {}", operand.ty)));
                    }
                    frame.push_value(Expr::unary(UnaryOp::Neg, operand));
                }
                Instruction::Compare(op) => {
                    let right = self.pop_value(pc, &mut frame)?;
                    let left = self.pop_value(pc, &mut frame)?;
                    frame.push_value(self.comparison(pc, *op, left, right)?);
                }
                Instruction::Convert(ty) => {
                    let operand = self.pop_value(pc, &mut frame)?;
                    frame.push_value(self.convert(pc, operand, ty)?);
                }
                Instruction::If { op, target } => {
                    let operand = self.pop_value(pc, &mut frame)?;
                    let cond = self.zero_test(pc, *op, operand)?;
                    return self.fork(pc, *target, cond, frame);
                }
                Instruction::IfCmp { op, target } => {
                    let right = self.pop_value(pc, &mut frame)?;
                    let left = self.pop_value(pc, &mut frame)?;
                    let cond = self.comparison(pc, *op, left, right)?;
                    return self.fork(pc, *target, cond, frame);
                }
                Instruction::Goto(target) => {
                    if *target <= pc {
                        return Err(self.irreducible(pc, format!("backward jump to {target}")));
                    }
                    pc = *target;
                    continue;
                }
                Instruction::Return => {
                    let value = self.pop_value(pc, &mut frame)?;
                    return self.coerce_return(pc, value);
                }
            }

            pc += 1;
        }
    }

    // Run both successors of a branch and join them. A predicate that folds
    // to a constant only explores the path it selects.
    fn fork(
        &mut self,
        pc: usize,
        target: usize,
        cond: Expr,
        frame: Frame<'b>,
    ) -> Result<Expr, TranslateError> {
        if target <= pc {
            return Err(self.irreducible(pc, format!("backward branch to {target}")));
        }
        self.forks += 1;
        if self.forks > self.env.config.max_branches {
            return Err(self.irreducible(
                pc,
                format!("more than {} branches", self.env.config.max_branches),
            ));
        }

        let cond = rewrite::simplify(&cond);
        match cond.as_bool() {
            Some(true) => self.run(target, frame),
            Some(false) => self.run(pc + 1, frame),
            None => {
                let taken = self.run(target, frame.clone())?;
                let fallthrough = self.run(pc + 1, frame)?;

                Ok(Expr::conditional(cond, taken, fallthrough))
            }
        }
    }

    //
    // Argument resolution
    //

    fn load_param(&self, index: usize) -> Result<Expr, TranslateError> {
        let arg = ArgRef::Param(index);
        let Some(expected) = self.body.params.get(index) else {
            return Err(self.arg_error(arg, "closure declares no such parameter"));
        };

        match expected {
            ValueType::Stream(_) => self
                .chain
                .resolve_sub_query(self.head, index, expected)
                .map(Expr::sub_query)
                .map_err(|err| self.handler_error(arg, &err)),
            ValueType::StreamSource => Ok(Expr::new(
                ExprKind::Constant(Value::Null),
                ValueType::StreamSource,
            )),
            _ => self
                .chain
                .resolve(self.head, arg, expected)
                .map_err(|err| self.handler_error(arg, &err)),
        }
    }

    fn load_capture(&self, slot: usize) -> Result<Expr, TranslateError> {
        let arg = ArgRef::Capture(slot);
        let Some(expected) = self.body.captures.get(slot) else {
            return Err(self.arg_error(arg, "closure declares no such capture"));
        };

        self.chain
            .resolve(self.head, arg, expected)
            .map_err(|err| self.handler_error(arg, &err))
    }

    /// Translate a nested single-parameter closure whose element is a row of
    /// `query`, inlining the element afterwards.
    fn translate_over(
        &mut self,
        pc: usize,
        pending: PendingClosure<'b>,
        query: &QueryAlgebra,
    ) -> Result<Expr, TranslateError> {
        if pending.body.params.len() != 1 {
            return Err(self.unsupported(
                pc,
                format!("{} must take exactly one parameter", pending.body.id),
            ));
        }

        let outer = self.chain.push(
            ArgumentHandler::OuterLambda {
                forwards: pending.forwards.to_vec(),
            },
            Some(pending.creator),
        );
        let head = self.chain.push_stream_element(query.row_type(), Some(outer));

        tracing::trace!(closure = %pending.body.id, parent = %self.body.id, "translating nested closure");
        let expr = Evaluator::new(
            pending.body,
            &mut *self.chain,
            head,
            self.env,
            &mut *self.next_source,
        )
        .evaluate()?;

        Ok(rewrite::inline_element(&expr, head.scope(), &query.current_row()))
    }

    fn allocate_source(&mut self) -> SourceId {
        let id = *self.next_source;
        *self.next_source = id.next();

        id
    }

    //
    // Operators
    //

    fn arith(
        &self,
        pc: usize,
        op: ArithOp,
        left: Expr,
        right: Expr,
    ) -> Result<Expr, TranslateError> {
        if !left.ty.is_numeric() || !right.ty.is_numeric() {
            return Err(self.unsupported(
                pc,
                format!("arithmetic '{op}' on {} and {}", left.ty, right.ty),
            ));
        }

        Ok(Expr::binary(op.into(), left, right))
    }

    fn comparison(
        &self,
        pc: usize,
        op: CompareOp,
        left: Expr,
        right: Expr,
    ) -> Result<Expr, TranslateError> {
        let (l, r) = (&left.ty, &right.ty);
        let equality = matches!(op, CompareOp::Eq | CompareOp::Ne);
        let comparable = (l.is_numeric() && r.is_numeric())
            || (l == r && l.is_orderable())
            || (equality && (l.accepts(r) || r.accepts(l)));

        if !comparable {
            return Err(self.unsupported(pc, format!("comparison '{op}' of {l} with {r}")));
        }

        Ok(Expr::compare(op, left, right))
    }

    // `If` tests the popped value against zero, or against false for booleans.
    fn zero_test(&self, pc: usize, op: CompareOp, operand: Expr) -> Result<Expr, TranslateError> {
        match (&operand.ty, op) {
            (ValueType::Bool, CompareOp::Eq) => Ok(Expr::not(operand)),
            (ValueType::Bool, CompareOp::Ne) => Ok(operand),
            (ty, _) if ty.is_numeric() => Ok(Expr::compare(op, operand, Expr::constant(0))),
            (ty, _) => Err(self.unsupported(pc, format!("branch '{op}' on a value of type {ty}"))),
        }
    }

    fn convert(&self, pc: usize, operand: Expr, ty: &ValueType) -> Result<Expr, TranslateError> {
        if operand.ty == *ty || (operand.ty.is_numeric() && ty.is_numeric()) {
            return Ok(operand.with_type(ty.clone()));
        }

        Err(self.unsupported(pc, format!("conversion of {} to {ty}", operand.ty)))
    }

    fn new_tuple(
        &self,
        pc: usize,
        arity: usize,
        frame: &mut Frame<'b>,
    ) -> Result<Expr, TranslateError> {
        if !(2..=5).contains(&arity) {
            return Err(self.unsupported(pc, format!("tuple of arity {arity}")));
        }
        let items = frame.pop_many(arity).ok_or_else(|| self.underflow(pc))?;

        Ok(Expr::tuple(self.values(pc, items)?))
    }

    // Integer 0/1 results of a boolean closure are booleans.
    fn coerce_return(&self, pc: usize, value: Expr) -> Result<Expr, TranslateError> {
        if self.body.returns != ValueType::Bool || value.ty == ValueType::Bool {
            return Ok(value);
        }

        match value.as_constant() {
            Some(Value::Int(0)) => Ok(Expr::bool(false)),
            Some(Value::Int(1)) => Ok(Expr::bool(true)),
            _ if value.ty.is_numeric() => {
                Ok(Expr::compare(CompareOp::Ne, value, Expr::constant(0)))
            }
            _ if value.ty == ValueType::Any => Ok(value.with_type(ValueType::Bool)),
            _ => Err(self.unsupported(pc, format!("boolean closure returns {}", value.ty))),
        }
    }

    //
    // Stack helpers
    //

    fn pop(&self, pc: usize, frame: &mut Frame<'b>) -> Result<StackItem<'b>, TranslateError> {
        frame.pop().ok_or_else(|| self.underflow(pc))
    }

    fn pop_value(&self, pc: usize, frame: &mut Frame<'b>) -> Result<Expr, TranslateError> {
        match self.pop(pc, frame)? {
            StackItem::Value(expr) => Ok(expr),
            StackItem::Closure(pending) => Err(self.unsupported(
                pc,
                format!("{} used as a value", pending.body.id),
            )),
        }
    }

    fn values(&self, pc: usize, items: Vec<StackItem<'b>>) -> Result<Vec<Expr>, TranslateError> {
        items
            .into_iter()
            .map(|item| match item {
                StackItem::Value(expr) => Ok(expr),
                StackItem::Closure(pending) => Err(self.unsupported(
                    pc,
                    format!("{} passed where a value is expected", pending.body.id),
                )),
            })
            .collect()
    }

    //
    // Errors
    //

    fn check_local(&self, pc: usize, slot: usize) -> Result<(), TranslateError> {
        if slot < self.env.config.max_locals {
            Ok(())
        } else {
            Err(self.unsupported(
                pc,
                format!("local slot {slot} beyond the {} allowed", self.env.config.max_locals),
            ))
        }
    }

    fn unsupported(&self, pc: usize, message: impl Into<String>) -> TranslateError {
        TranslateError::UnsupportedConstruct {
            closure: self.body.id,
            pc,
            message: message.into(),
        }
    }

    fn irreducible(&self, pc: usize, message: impl Into<String>) -> TranslateError {
        TranslateError::IrreducibleControlFlow {
            closure: self.body.id,
            pc,
            message: message.into(),
        }
    }

    fn underflow(&self, pc: usize) -> TranslateError {
        self.unsupported(pc, "operand stack underflow")
    }

    fn arg_error(&self, arg: ArgRef, message: impl Into<String>) -> TranslateError {
        TranslateError::ArgumentResolution {
            closure: self.body.id,
            arg,
            message: message.into(),
        }
    }

    fn handler_error(&self, arg: ArgRef, err: &HandlerError) -> TranslateError {
        self.arg_error(arg, err.to_string())
    }
}
