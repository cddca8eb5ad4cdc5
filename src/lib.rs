//! Single-step Bitcoin Script interpreter.
//!
//! A [Stepper] runs a raw script one operation at a time, optionally against a
//! bound spending transaction ([TxContext]), and reports a stack snapshot and
//! a short description of the effect after every step.
//!
//! ```
//! use bitcoin_scriptstep::{Options, StepOutcome, Stepper};
//!
//! // OP_2 OP_3 OP_ADD
//! let mut stepper = Stepper::new(&[0x52, 0x53, 0x93], None, Options::default());
//! while let StepOutcome::Continue(step) = stepper.step() {
//!     println!("{} {}: {}", step.pc, step.op, step.action);
//! }
//! assert_eq!(stepper.stack().unwrap().as_v8_vec(), &[vec![5]]);
//! ```

use log::{debug, trace};

mod error;
pub use error::{ErrorKind, ExecError};

pub mod decode;
pub use decode::{decode, DecodedScript, Operation};

pub mod tx;
pub use tx::TxContext;

mod stack;
pub use stack::{cast_to_bool, read_scriptint, scriptint_vec, Stack, StackSnapshot};

mod data_structures;
pub use data_structures::BranchStack;

mod state;
pub use state::ExecState;

pub mod opcodes;
mod signatures;

pub mod json;

#[cfg(feature = "wasm")]
mod wasm;

#[cfg(test)]
mod tests;

/// Maximum number of bytes pushable to the stack
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of values on script interpreter stack
pub const MAX_STACK_SIZE: usize = 1000;

/// Used to fine-tune interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Reject numeric operands that are not minimally encoded.
    pub require_minimal: bool,
}

/// State of a [Stepper].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    /// Holds the index of the next operation to run.
    Running(usize),
    Finished,
    Failed,
}

/// A successfully executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Index of the operation that ran.
    pub pc: usize,
    /// Name of the opcode the operation was encoded with.
    pub op: String,
    /// Main stack right after the step, top first.
    pub stack: StackSnapshot,
    pub action: String,
}

/// Result of a single [Stepper::step] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue(Step),
    EndOfScript,
    Error(ExecError),
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::Continue(_))
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The script ran to its end and left a true value on top.
    pub success: bool,
    pub error: Option<ExecError>,
    /// Name of the opcode that failed, if any.
    pub opcode: Option<String>,
    pub final_stack: StackSnapshot,
}

/// A full run: every executed step followed by the terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub steps: Vec<Step>,
    pub end: StepOutcome,
}

/// Resumable script driver.
///
/// Stepping one operation at a time and [Stepper::run_to_completion] go
/// through the same state machine, so both observe identical behavior. Once a
/// terminal outcome has been returned, further calls to [Stepper::step] keep
/// returning it until [Stepper::reset] is called.
pub struct Stepper {
    opts: Options,
    script: Result<DecodedScript, ExecError>,
    tx: Option<TxContext>,
    state: Option<ExecState>,
    phase: Phase,
    terminal: Option<StepOutcome>,
}

impl Stepper {
    pub fn new(script: &[u8], tx: Option<TxContext>, opts: Options) -> Stepper {
        let script = decode(script);
        if let Err(ref e) = script {
            debug!("script does not decode: {}", e);
        }
        Stepper {
            opts,
            script,
            tx,
            state: None,
            phase: Phase::NotStarted,
            terminal: None,
        }
    }

    /// Prepares a new run, discarding any previous state.
    ///
    /// The script is decoded right away. A decoding error is returned here and
    /// is also what the first [Stepper::step] reports.
    pub fn reset(&mut self, script: &[u8], tx: Option<TxContext>) -> Result<(), ExecError> {
        self.script = decode(script);
        self.tx = tx;
        self.state = None;
        self.phase = Phase::NotStarted;
        self.terminal = None;

        match self.script {
            Ok(ref s) => {
                trace!(
                    "reset: {} operation(s), transaction bound: {}",
                    s.len(),
                    self.tx.is_some()
                );
                Ok(())
            }
            Err(ref e) => {
                debug!("reset: script does not decode: {}", e);
                Err(e.clone())
            }
        }
    }

    //////////////////
    // SOME GETTERS //
    //////////////////

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn script(&self) -> Option<&DecodedScript> {
        self.script.as_ref().ok()
    }

    pub fn tx(&self) -> Option<&TxContext> {
        self.tx.as_ref()
    }

    /// The execution state, once the first step materialized it.
    pub fn state(&self) -> Option<&ExecState> {
        self.state.as_ref()
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.state.as_ref().map(|s| s.stack())
    }

    pub fn altstack(&self) -> Option<&Stack> {
        self.state.as_ref().map(|s| s.altstack())
    }

    /// Operations not executed yet.
    pub fn remaining(&self) -> &[Operation] {
        match (&self.script, self.phase) {
            (Ok(s), Phase::NotStarted) => s.ops(),
            (Ok(s), Phase::Running(pc)) => &s.ops()[pc.min(s.len())..],
            _ => &[],
        }
    }

    /// Summary of the run, available once it reached a terminal state.
    pub fn result(&self) -> Option<ExecutionResult> {
        let final_stack = self
            .state
            .as_ref()
            .map(|s| s.stack().snapshot())
            .unwrap_or_default();
        match self.terminal.as_ref()? {
            StepOutcome::EndOfScript => Some(ExecutionResult {
                success: final_stack.top().map(cast_to_bool).unwrap_or(false),
                error: None,
                opcode: None,
                final_stack,
            }),
            StepOutcome::Error(e) => Some(ExecutionResult {
                success: false,
                error: Some(e.clone()),
                opcode: match (&self.script, &self.state) {
                    (Ok(script), Some(state)) if state.pc() < script.len() => {
                        Some(script.op_name(state.pc()))
                    }
                    _ => None,
                },
                final_stack,
            }),
            StepOutcome::Continue(_) => None,
        }
    }

    ///////////////
    // EXECUTION //
    ///////////////

    /// Runs the next operation.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(ref outcome) = self.terminal {
            return outcome.clone();
        }

        let outcome = self.exec_next();
        if outcome.is_terminal() {
            self.phase = match outcome {
                StepOutcome::EndOfScript => Phase::Finished,
                _ => Phase::Failed,
            };
            match outcome {
                StepOutcome::Error(ref e) => debug!("execution failed: {}", e),
                _ => debug!("end of script"),
            }
            self.terminal = Some(outcome.clone());
        }
        outcome
    }

    /// Steps until a terminal outcome and returns it.
    pub fn run_to_completion(&mut self) -> StepOutcome {
        loop {
            match self.step() {
                StepOutcome::Continue(_) => continue,
                outcome => return outcome,
            }
        }
    }

    /// Like [Stepper::run_to_completion], keeping every step for the log.
    pub fn run_trace(&mut self) -> Trace {
        let mut steps = Vec::new();
        loop {
            match self.step() {
                StepOutcome::Continue(step) => steps.push(step),
                end => return Trace { steps, end },
            }
        }
    }

    fn exec_next(&mut self) -> StepOutcome {
        let script = match self.script {
            Ok(ref s) => s,
            Err(ref e) => return StepOutcome::Error(e.clone()),
        };

        if self.phase == Phase::NotStarted {
            trace!("starting execution");
            self.phase = Phase::Running(0);
        }
        let state = self.state.get_or_insert_with(ExecState::new);

        let pc = state.pc();
        let operation = match script.get(pc) {
            Some(op) => op,
            None if state.branches().is_empty() => return StepOutcome::EndOfScript,
            None => {
                return StepOutcome::Error(ExecError::new(
                    ErrorKind::UnbalancedIf,
                    format!(
                        "end of script with {} unclosed OP_IF block(s)",
                        state.branches().len()
                    ),
                ));
            }
        };

        match opcodes::execute(operation, state, script, self.tx.as_ref(), &self.opts) {
            Ok(action) => {
                state.advance();
                self.phase = Phase::Running(state.pc());
                let step = Step {
                    pc,
                    op: script.op_name(pc),
                    stack: state.stack().snapshot(),
                    action,
                };
                debug!("step {} {}: {}", step.pc, step.op, step.action);
                StepOutcome::Continue(step)
            }
            Err(e) => StepOutcome::Error(e),
        }
    }
}
