//! Binding of a spending transaction to a run.

use bitcoin::consensus::deserialize;
use bitcoin::hashes::Hash;
use bitcoin::hex::FromHex;
use bitcoin::sighash::SighashCache;
use bitcoin::{Script, Transaction, Txid};

use crate::{ErrorKind, ExecError};

/// A decoded spending transaction together with the input being evaluated.
///
/// Immutable once bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    tx: Transaction,
    input_idx: usize,
}

impl TxContext {
    /// Decodes `raw` as a consensus-encoded transaction and binds input
    /// `input_idx` of it.
    pub fn bind(raw: &[u8], input_idx: usize) -> Result<TxContext, ExecError> {
        let tx: Transaction = deserialize(raw).map_err(|e| {
            ExecError::new(
                ErrorKind::MalformedTransaction,
                format!("cannot decode transaction: {}", e),
            )
        })?;
        TxContext::new(tx, input_idx)
    }

    /// Like [TxContext::bind], for the hex form of the transaction.
    pub fn bind_hex(raw_hex: &str, input_idx: usize) -> Result<TxContext, ExecError> {
        let raw = Vec::<u8>::from_hex(raw_hex.trim()).map_err(|e| {
            ExecError::new(
                ErrorKind::MalformedTransaction,
                format!("invalid transaction hex: {}", e),
            )
        })?;
        TxContext::bind(&raw, input_idx)
    }

    pub fn new(tx: Transaction, input_idx: usize) -> Result<TxContext, ExecError> {
        if input_idx >= tx.input.len() {
            return Err(ExecError::new(
                ErrorKind::InputIndexOutOfRange,
                format!(
                    "input index {} out of range, transaction has {} input(s)",
                    input_idx,
                    tx.input.len()
                ),
            ));
        }
        Ok(TxContext { tx, input_idx })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn input_idx(&self) -> usize {
        self.input_idx
    }

    pub fn input_count(&self) -> usize {
        self.tx.input.len()
    }

    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Legacy signature hash of `input_idx` with `script_code` in place of its
    /// scriptSig.
    ///
    /// The full 32-bit hash type is committed to; the low bits select which
    /// inputs and outputs are covered. `SIGHASH_SINGLE` on an input without a
    /// matching output yields the digest `1`, as in consensus.
    pub fn sighash(
        &self,
        script_code: &Script,
        input_idx: usize,
        hash_type: u32,
    ) -> Result<[u8; 32], ExecError> {
        let cache = SighashCache::new(&self.tx);
        let hash = cache
            .legacy_signature_hash(input_idx, script_code, hash_type)
            .map_err(|e| ExecError::new(ErrorKind::InputIndexOutOfRange, e.to_string()))?;
        Ok(hash.to_byte_array())
    }
}
