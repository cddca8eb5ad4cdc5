use std::fmt;

use bitcoin::hex::DisplayHex;
use bitcoin::Script;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{ExecutionResult, Step, Stepper, Trace};

/// Simple utility wrapper to serde-serialize using [fmt::Display].
struct FmtSer<'a, T: fmt::Display>(&'a T);
impl<'a, T: fmt::Display> Serialize for FmtSer<'a, T> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.0)
    }
}

/// Wrapper to fmt::Display a Script as ASM.
struct ScriptAsm<'a>(&'a Script);
impl<'a> fmt::Display for ScriptAsm<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt_asm(f)
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut m = s.serialize_map(Some(4))?;
        m.serialize_entry("pc", &self.pc)?;
        m.serialize_entry("op", &self.op)?;
        m.serialize_entry("action", &self.action)?;
        m.serialize_entry("stack", &self.stack)?;
        m.end()
    }
}

impl Serialize for ExecutionResult {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut m = s.serialize_map(None)?;
        m.serialize_entry("success", &self.success)?;
        if let Some(ref err) = self.error {
            m.serialize_entry("error_kind", &err.kind)?;
            m.serialize_entry("error", &err.message)?;
        }
        if let Some(ref opcode) = self.opcode {
            m.serialize_entry("opcode", opcode)?;
        }
        m.serialize_entry("final_stack", &self.final_stack)?;
        m.end()
    }
}

struct StepsSer<'a>(&'a [Step]);
impl<'a> Serialize for StepsSer<'a> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.0.len()))?;
        for step in self.0 {
            seq.serialize_element(step)?;
        }
        seq.end()
    }
}

/// The document emitted for a whole run: script, bound transaction, the step
/// log and the final result.
pub struct RunLog<'a> {
    pub script: Option<&'a Script>,
    pub txid: Option<bitcoin::Txid>,
    pub input_idx: Option<usize>,
    pub steps: &'a [Step],
    pub result: Option<&'a ExecutionResult>,
}

impl<'a> Serialize for RunLog<'a> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut m = s.serialize_map(None)?;
        if let Some(script) = self.script {
            m.serialize_entry("script_hex", &FmtSer(&script.as_bytes().as_hex()))?;
            m.serialize_entry("script_asm", &FmtSer(&ScriptAsm(script)))?;
        }
        if let Some(ref txid) = self.txid {
            m.serialize_entry("txid", &FmtSer(txid))?;
        }
        if let Some(idx) = self.input_idx {
            m.serialize_entry("input_index", &idx)?;
        }
        m.serialize_entry("steps", &StepsSer(self.steps))?;
        if let Some(result) = self.result {
            m.serialize_entry("result", result)?;
        }
        m.end()
    }
}

/// Runs `stepper` to its end and renders the whole run as JSON.
pub fn run_to_json(stepper: &mut Stepper) -> Result<serde_json::Value, serde_json::Error> {
    let Trace { steps, .. } = stepper.run_trace();
    let result = stepper.result();
    let log = RunLog {
        script: stepper.script().map(|s| s.as_script()),
        txid: stepper.tx().map(|t| t.txid()),
        input_idx: stepper.tx().map(|t| t.input_idx()),
        steps: &steps,
        result: result.as_ref(),
    };
    serde_json::to_value(&log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;

    #[test]
    fn run_document_layout() {
        // OP_2 OP_3 OP_ADD
        let mut stepper = Stepper::new(&[0x52, 0x53, 0x93], None, Options::default());
        let doc = run_to_json(&mut stepper).unwrap();

        assert_eq!(doc["script_hex"], "525393");
        assert_eq!(doc["script_asm"], "OP_PUSHNUM_2 OP_PUSHNUM_3 OP_ADD");
        assert!(doc.get("txid").is_none());

        let steps = doc["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2]["pc"], 2);
        assert_eq!(steps[2]["op"], "OP_ADD");
        assert_eq!(steps[2]["stack"], serde_json::json!(["05"]));

        assert_eq!(doc["result"]["success"], true);
        assert_eq!(doc["result"]["final_stack"], serde_json::json!(["05"]));
    }

    #[test]
    fn failed_run_carries_error() {
        // OP_ADD
        let mut stepper = Stepper::new(&[0x93], None, Options::default());
        let doc = run_to_json(&mut stepper).unwrap();

        assert_eq!(doc["steps"].as_array().unwrap().len(), 0);
        assert_eq!(doc["result"]["success"], false);
        assert_eq!(doc["result"]["error_kind"], "StackUnderflow");
        assert_eq!(doc["result"]["opcode"], "OP_ADD");
    }
}
