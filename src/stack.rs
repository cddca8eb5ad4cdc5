use std::fmt;

use bitcoin::hex::DisplayHex;
use bitcoin::script::{read_scriptbool, write_scriptint};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::{ErrorKind, ExecError};

/// Maximum size in bytes of a numeric operand.
pub const MAX_SCRIPTNUM_SIZE: usize = 4;

/// Returns minimally encoded scriptint as a byte vector.
pub fn scriptint_vec(n: i64) -> Vec<u8> {
    let mut buf = [0u8; 8];
    let len = write_scriptint(&mut buf, n);
    buf[0..len].to_vec()
}

/// Decodes a script number of at most `max_size` bytes.
///
/// Longer inputs are rejected before anything is computed. When
/// `require_minimal` is set, encodings with superfluous high bytes (including
/// negative zero) are rejected as well.
pub fn read_scriptint(v: &[u8], max_size: usize, require_minimal: bool) -> Result<i64, ExecError> {
    debug_assert!(max_size <= 7);
    if v.len() > max_size {
        return Err(ExecError::new(
            ErrorKind::NumericOverflow,
            format!(
                "numeric operand is {} bytes, at most {} allowed",
                v.len(),
                max_size
            ),
        ));
    }

    let last = match v.last() {
        Some(last) => *last,
        None => return Ok(0),
    };

    // If the most-significant-byte - excluding the sign bit - is zero then
    // we're not minimal, unless the byte below needs its high bit for the
    // magnitude (+-255 encode as 0xff00 and 0xff80).
    if require_minimal && (last & 0x7f) == 0 && (v.len() <= 1 || (v[v.len() - 2] & 0x80) == 0) {
        return Err(ExecError::new(
            ErrorKind::NumericOverflow,
            format!("non-minimally encoded number {}", v.as_hex()),
        ));
    }

    let (mut ret, sh) = v
        .iter()
        .fold((0i64, 0), |(acc, sh), n| (acc | ((*n as i64) << sh), sh + 8));
    if last & 0x80 != 0 {
        ret &= (1 << (sh - 1)) - 1;
        ret = -ret;
    }
    Ok(ret)
}

/// Script truthiness: any non-zero byte, except for negative zero.
pub fn cast_to_bool(v: &[u8]) -> bool {
    read_scriptbool(v)
}

/// The interpreter stack. The top of the stack is the last element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack(Vec<Vec<u8>>);

impl Stack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Item at `offset` from the top, -1 being the top itself.
    pub fn top(&self, offset: isize) -> Result<&Vec<u8>, ExecError> {
        debug_assert!(offset < 0, "offsets should be < 0");
        self.0
            .len()
            .checked_sub(offset.unsigned_abs())
            .map(|i| &self.0[i])
            .ok_or_else(|| ExecError::underflow(offset.unsigned_abs(), self.len()))
    }

    pub fn topnum(&self, offset: isize, require_minimal: bool) -> Result<i64, ExecError> {
        read_scriptint(self.top(offset)?, MAX_SCRIPTNUM_SIZE, require_minimal)
    }

    pub fn needn(&self, min_nb_items: usize) -> Result<(), ExecError> {
        if self.len() < min_nb_items {
            Err(ExecError::underflow(min_nb_items, self.len()))
        } else {
            Ok(())
        }
    }

    pub fn push(&mut self, v: Vec<u8>) {
        self.0.push(v);
    }

    pub fn pushnum(&mut self, num: i64) {
        self.0.push(scriptint_vec(num));
    }

    pub fn pushbool(&mut self, b: bool) {
        self.pushnum(b as i64);
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.0.pop()
    }

    pub fn popstr(&mut self) -> Result<Vec<u8>, ExecError> {
        self.0.pop().ok_or_else(|| ExecError::underflow(1, 0))
    }

    pub fn popn(&mut self, n: usize) -> Result<Vec<Vec<u8>>, ExecError> {
        self.needn(n)?;
        Ok(self.0.split_off(self.0.len() - n))
    }

    /// Inserts `v` at `index` counted from the bottom.
    pub fn insert(&mut self, index: usize, v: Vec<u8>) {
        self.0.insert(index, v);
    }

    /// Removes and returns the item at `index` counted from the bottom.
    pub fn remove(&mut self, index: usize) -> Vec<u8> {
        self.0.remove(index)
    }

    /// Copy of the stack, top item first.
    pub fn snapshot(&self) -> StackSnapshot {
        StackSnapshot(self.0.iter().rev().cloned().collect())
    }

    pub fn as_v8_vec(&self) -> &[Vec<u8>] {
        &self.0
    }
}

/// A wrapper for the stack types to print them in Bitcoin Script ASM format.
impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut iter = self.0.iter().rev().peekable();
        while let Some(bytes) = iter.next() {
            if bytes.is_empty() {
                write!(f, "0")?;
            } else if let Ok(num) = read_scriptint(bytes, MAX_SCRIPTNUM_SIZE, true) {
                write!(f, "{}", num)?;
            } else {
                write!(f, "{}", bytes.as_hex())?;
            }
            if iter.peek().is_some() {
                write!(f, " ")?;
            }
        }
        Ok(())
    }
}

/// Immutable copy of a stack taken after a step, top item first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackSnapshot(Vec<Vec<u8>>);

impl StackSnapshot {
    pub fn items(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn top(&self) -> Option<&[u8]> {
        self.0.first().map(|v| &v[..])
    }

    /// Items as lowercase hex strings, top item first.
    pub fn to_hex(&self) -> Vec<String> {
        self.0.iter().map(|i| i.to_lower_hex_string()).collect()
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut iter = self.0.iter().peekable();
        while let Some(item) = iter.next() {
            write!(f, "<{}>", item.as_hex())?;
            if iter.peek().is_some() {
                write!(f, " ")?;
            }
        }
        Ok(())
    }
}

/// Serialized as a list of hex strings, top item first.
impl Serialize for StackSnapshot {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(self.0.len()))?;
        for i in self.0.iter() {
            seq.serialize_element(&i.to_lower_hex_string())?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scriptint_roundtrip_edges() {
        assert_eq!(scriptint_vec(0), Vec::<u8>::new());
        assert_eq!(scriptint_vec(5), vec![0x05]);
        assert_eq!(scriptint_vec(-1), vec![0x81]);
        assert_eq!(scriptint_vec(255), vec![0xff, 0x00]);
        assert_eq!(scriptint_vec(-255), vec![0xff, 0x80]);
        assert_eq!(read_scriptint(&[0xff, 0x80], 4, true).unwrap(), -255);
        assert_eq!(read_scriptint(&[0xff, 0xff, 0xff, 0x7f], 4, true).unwrap(), i32::MAX as i64);
    }

    #[test]
    fn scriptint_rejects_oversized_operand() {
        let err = read_scriptint(&[1, 2, 3, 4, 5], 4, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericOverflow);
    }

    #[test]
    fn scriptint_minimal_check() {
        assert_eq!(read_scriptint(&[0x05, 0x00], 4, false).unwrap(), 5);
        assert_eq!(
            read_scriptint(&[0x05, 0x00], 4, true).unwrap_err().kind,
            ErrorKind::NumericOverflow
        );
        assert_eq!(read_scriptint(&[0x80], 4, false).unwrap(), 0);
        assert!(read_scriptint(&[0x80], 4, true).is_err());
    }

    #[test]
    fn truthiness() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(!cast_to_bool(&[0x80]));
        assert!(!cast_to_bool(&[0x00, 0x80]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x01]));
    }

    #[test]
    fn snapshot_is_top_first_and_detached() {
        let mut stack = Stack::new();
        stack.push(vec![1]);
        stack.push(vec![2]);
        let snap = stack.snapshot();
        stack.pop();
        stack.push(vec![3]);
        assert_eq!(snap.items(), &[vec![2], vec![1]]);
        assert_eq!(snap.to_hex(), vec!["02".to_owned(), "01".to_owned()]);
        assert_eq!(stack.to_string(), "3 1");
    }

    #[test]
    fn popn_keeps_order() {
        let mut stack = Stack::new();
        for i in 1..=3 {
            stack.push(vec![i]);
        }
        assert_eq!(stack.popn(2).unwrap(), vec![vec![2], vec![3]]);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.popn(2).unwrap_err().kind, ErrorKind::StackUnderflow);
        assert_eq!(stack.len(), 1);
    }
}
