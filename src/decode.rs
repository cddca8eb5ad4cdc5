//! Turns raw script bytes into a sequence of [`Operation`]s.

use std::fmt;

use bitcoin::hex::DisplayHex;
use bitcoin::opcodes::all::OP_PUSHNUM_16;
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Instruction, Script, ScriptBuf};

use crate::{ErrorKind, ExecError, MAX_SCRIPT_ELEMENT_SIZE};

/// Maximum number of non-push operations per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum script length in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// A single decoded script operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Literal data, pushed as-is. Covers `OP_0` and all `OP_PUSHBYTES_*` and
    /// `OP_PUSHDATA*` forms.
    Push(Vec<u8>),
    /// Any other instruction.
    Opcode(Opcode),
}

impl Operation {
    /// Whether this operation counts towards [MAX_OPS_PER_SCRIPT].
    pub fn is_counted(&self) -> bool {
        match self {
            Operation::Push(_) => false,
            Operation::Opcode(op) => op.to_u8() > OP_PUSHNUM_16.to_u8(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Push(data) if data.is_empty() => write!(f, "OP_0"),
            Operation::Push(data) => write!(f, "<{}>", data.as_hex()),
            Operation::Opcode(op) => write!(f, "{}", op),
        }
    }
}

/// A fully decoded script.
///
/// Keeps the raw bytes next to the operations so that the byte range of every
/// operation can be recovered, which the signature opcodes need to build
/// script-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedScript {
    script: ScriptBuf,
    ops: Vec<Operation>,
    offsets: Vec<usize>,
}

impl DecodedScript {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn get(&self, pc: usize) -> Option<&Operation> {
        self.ops.get(pc)
    }

    pub fn as_script(&self) -> &Script {
        &self.script
    }

    /// Byte offset of operation `pc` in the raw script.
    ///
    /// `pc == len()` yields the script length.
    pub fn offset(&self, pc: usize) -> usize {
        self.offsets
            .get(pc)
            .copied()
            .unwrap_or_else(|| self.script.len())
    }

    /// Raw encoding of operation `pc`, including any push prefix.
    pub fn raw_op(&self, pc: usize) -> &[u8] {
        &self.script.as_bytes()[self.offset(pc)..self.offset(pc + 1)]
    }

    /// Name of the opcode byte operation `pc` was encoded with.
    pub fn op_name(&self, pc: usize) -> String {
        match self.raw_op(pc).first() {
            Some(0) => "OP_0".to_owned(),
            Some(b) => Opcode::from(*b).to_string(),
            None => String::new(),
        }
    }

    /// Indices of all operations starting at or after byte `from`.
    pub fn ops_from(&self, from: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.offsets.partition_point(|o| *o < from);
        start..self.ops.len()
    }
}

/// Decodes a raw script.
///
/// Fails with [ErrorKind::InvalidPushLength] if a push runs past the end of the
/// script or exceeds the element size limit, and with
/// [ErrorKind::ScriptSizeExceeded] if the script is too long or holds too many
/// non-push operations.
pub fn decode(bytes: &[u8]) -> Result<DecodedScript, ExecError> {
    if bytes.len() > MAX_SCRIPT_SIZE {
        return Err(ExecError::new(
            ErrorKind::ScriptSizeExceeded,
            format!(
                "script is {} bytes, at most {} allowed",
                bytes.len(),
                MAX_SCRIPT_SIZE
            ),
        ));
    }

    let script = Script::from_bytes(bytes);
    let mut instructions = script.instructions();
    let mut ops = Vec::new();
    let mut offsets = Vec::new();
    let mut counted = 0;
    loop {
        let offset = bytes.len() - instructions.as_script().len();
        let op = match instructions.next() {
            None => break,
            Some(Err(e)) => {
                return Err(ExecError::new(
                    ErrorKind::InvalidPushLength,
                    format!("invalid push at byte {}: {}", offset, e),
                ));
            }
            Some(Ok(Instruction::PushBytes(p))) => {
                if p.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(ExecError::new(
                        ErrorKind::InvalidPushLength,
                        format!(
                            "push at byte {} is {} bytes, at most {} allowed",
                            offset,
                            p.len(),
                            MAX_SCRIPT_ELEMENT_SIZE
                        ),
                    ));
                }
                Operation::Push(p.as_bytes().to_vec())
            }
            Some(Ok(Instruction::Op(op))) => Operation::Opcode(op),
        };

        if op.is_counted() {
            counted += 1;
            if counted > MAX_OPS_PER_SCRIPT {
                return Err(ExecError::new(
                    ErrorKind::ScriptSizeExceeded,
                    format!("more than {} non-push operations", MAX_OPS_PER_SCRIPT),
                ));
            }
        }
        ops.push(op);
        offsets.push(offset);
    }

    Ok(DecodedScript {
        script: script.to_owned(),
        ops,
        offsets,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::opcodes::all::*;

    use super::*;

    #[test]
    fn decodes_pushes_and_opcodes() {
        // OP_0 <0203> OP_PUSHDATA1 <ff> OP_DUP OP_2
        let script = decode(&[0x00, 0x02, 0x02, 0x03, 0x4c, 0x01, 0xff, 0x76, 0x52]).unwrap();
        assert_eq!(
            script.ops(),
            &[
                Operation::Push(vec![]),
                Operation::Push(vec![2, 3]),
                Operation::Push(vec![0xff]),
                Operation::Opcode(OP_DUP),
                Operation::Opcode(OP_PUSHNUM_2),
            ]
        );
        assert_eq!(script.offset(2), 4);
        assert_eq!(script.offset(5), 9);
        assert_eq!(script.raw_op(2), &[0x4c, 0x01, 0xff]);
        assert_eq!(script.op_name(0), "OP_0");
        assert_eq!(script.op_name(2), "OP_PUSHDATA1");
        assert_eq!(script.op_name(3), "OP_DUP");
        assert_eq!(script.ops().iter().filter(|o| o.is_counted()).count(), 1);
        assert_eq!(script.ops_from(4).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn truncated_push_is_rejected() {
        let err = decode(&[0x03, 0x01, 0x02]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPushLength);

        let err = decode(&[0x4d, 0xff]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPushLength);
    }

    #[test]
    fn oversized_push_is_rejected() {
        let mut bytes = vec![0x4d, 0x09, 0x02];
        bytes.extend(std::iter::repeat(0u8).take(521));
        assert_eq!(decode(&bytes).unwrap_err().kind, ErrorKind::InvalidPushLength);
    }

    #[test]
    fn op_count_limit() {
        let ok = vec![OP_NOP.to_u8(); MAX_OPS_PER_SCRIPT];
        assert!(decode(&ok).is_ok());

        let mut too_many = ok.clone();
        too_many.push(OP_NOP.to_u8());
        assert_eq!(decode(&too_many).unwrap_err().kind, ErrorKind::ScriptSizeExceeded);

        // small-number pushes don't count
        let mut pushes = ok;
        pushes.extend(vec![OP_PUSHNUM_1.to_u8(); 50]);
        assert!(decode(&pushes).is_ok());
    }

    #[test]
    fn decoding_is_deterministic() {
        let bytes = [0x51, 0x52, 0x93, 0x01, 0xaa, 0x87];
        assert_eq!(decode(&bytes).unwrap(), decode(&bytes).unwrap());
    }
}
