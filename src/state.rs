use crate::data_structures::BranchStack;
use crate::{ErrorKind, ExecError, Stack, MAX_STACK_SIZE};

/// Mutable interpreter state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecState {
    stack: Stack,
    altstack: Stack,
    branches: BranchStack,
    pc: usize,
    /// Byte offset where script-code starts, moved by `OP_CODESEPARATOR`.
    codesep_pos: usize,
}

impl ExecState {
    pub fn new() -> ExecState {
        ExecState {
            stack: Stack::new(),
            altstack: Stack::new(),
            branches: BranchStack::new(),
            pc: 0,
            codesep_pos: 0,
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn altstack(&self) -> &Stack {
        &self.altstack
    }

    pub fn branches(&self) -> &BranchStack {
        &self.branches
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn codesep_pos(&self) -> usize {
        self.codesep_pos
    }

    pub fn set_codesep_pos(&mut self, pos: usize) {
        self.codesep_pos = pos;
    }

    pub fn push_main(&mut self, item: Vec<u8>) {
        self.stack.push(item);
    }

    pub fn pop_main(&mut self) -> Result<Vec<u8>, ExecError> {
        self.stack.pop().ok_or_else(|| ExecError::underflow(1, 0))
    }

    pub fn push_alt(&mut self, item: Vec<u8>) {
        self.altstack.push(item);
    }

    pub fn pop_alt(&mut self) -> Result<Vec<u8>, ExecError> {
        self.altstack.pop().ok_or_else(|| {
            ExecError::new(ErrorKind::StackUnderflow, "alt stack is empty")
        })
    }

    /// Whether operations at the current position execute, i.e. every open
    /// branch is taken.
    pub fn executing(&self) -> bool {
        self.branches.all_true()
    }

    pub fn enter_branch(&mut self, taken: bool) {
        self.branches.push(taken);
    }

    pub fn else_branch(&mut self) -> Result<(), ExecError> {
        if self.branches.toggle_top() {
            Ok(())
        } else if self.branches.is_empty() {
            Err(ExecError::new(
                ErrorKind::UnbalancedElse,
                "OP_ELSE without matching OP_IF",
            ))
        } else {
            Err(ExecError::new(
                ErrorKind::UnbalancedElse,
                "second OP_ELSE in the same OP_IF block",
            ))
        }
    }

    pub fn exit_branch(&mut self) -> Result<(), ExecError> {
        if self.branches.pop() {
            Ok(())
        } else {
            Err(ExecError::new(
                ErrorKind::UnbalancedEndif,
                "OP_ENDIF without matching OP_IF",
            ))
        }
    }

    pub fn advance(&mut self) {
        self.pc += 1;
    }

    /// Fails if the combined stacks outgrew [MAX_STACK_SIZE].
    pub fn check_size(&self) -> Result<(), ExecError> {
        let size = self.stack.len() + self.altstack.len();
        if size > MAX_STACK_SIZE {
            return Err(ExecError::new(
                ErrorKind::ScriptSizeExceeded,
                format!("{} stack items, at most {} allowed", size, MAX_STACK_SIZE),
            ));
        }
        Ok(())
    }
}

impl Default for ExecState {
    fn default() -> Self {
        Self::new()
    }
}
