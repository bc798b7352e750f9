use crate::{
    closure::{ArgRef, ClosureBody},
    expr::Expr,
    handler::HandlerId,
};

///
/// PendingClosure
/// A nested closure pushed by `MakeClosure` and not yet consumed by a call.
///

#[derive(Clone, Copy, Debug)]
pub(super) struct PendingClosure<'b> {
    pub body: &'b ClosureBody,
    pub forwards: &'b [ArgRef],
    /// Head of the chain that was active when the closure was created.
    pub creator: HandlerId,
}

///
/// StackItem
///

#[derive(Clone, Debug)]
pub(super) enum StackItem<'b> {
    Value(Expr),
    Closure(PendingClosure<'b>),
}

///
/// Frame
/// Abstract operand stack and locals for one evaluation path.
///

#[derive(Clone, Debug, Default)]
pub(super) struct Frame<'b> {
    stack: Vec<StackItem<'b>>,
    locals: Vec<Option<StackItem<'b>>>,
}

impl<'b> Frame<'b> {
    pub fn push(&mut self, item: StackItem<'b>) {
        self.stack.push(item);
    }

    pub fn push_value(&mut self, expr: Expr) {
        self.stack.push(StackItem::Value(expr));
    }

    pub fn pop(&mut self) -> Option<StackItem<'b>> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Option<&StackItem<'b>> {
        self.stack.last()
    }

    /// Pop `count` items, returned bottom-first.
    pub fn pop_many(&mut self, count: usize) -> Option<Vec<StackItem<'b>>> {
        let at = self.stack.len().checked_sub(count)?;

        Some(self.stack.split_off(at))
    }

    pub fn load(&self, slot: usize) -> Option<&StackItem<'b>> {
        self.locals.get(slot).and_then(Option::as_ref)
    }

    pub fn store(&mut self, slot: usize, item: StackItem<'b>) {
        if self.locals.len() <= slot {
            self.locals.resize(slot + 1, None);
        }
        self.locals[slot] = Some(item);
    }
}
