use bitcoin::opcodes::all::OP_CODESEPARATOR;
use bitcoin::script::{Builder, PushBytes};
use bitcoin::secp256k1::{self, ecdsa, Message, PublicKey};
use bitcoin::{Script, ScriptBuf};

use crate::decode::{DecodedScript, Operation};
use crate::tx::TxContext;
use crate::ExecError;

lazy_static::lazy_static! {
    static ref SECP: secp256k1::Secp256k1<secp256k1::VerifyOnly> =
        secp256k1::Secp256k1::verification_only();
}

/// Encodes `data` as a single push, the way it would appear in a script.
fn push_pattern(data: &[u8]) -> Option<ScriptBuf> {
    let push = <&PushBytes>::try_from(data).ok()?;
    Some(Builder::new().push_slice(push).into_script())
}

/// Builds the script-code for a signature check.
///
/// This is the script from byte `from` (just past the last executed
/// `OP_CODESEPARATOR`) to the end, without any remaining `OP_CODESEPARATOR`
/// and with every operation that pushes one of `sigs` removed. Matching
/// happens on operation boundaries only.
pub fn script_code(script: &DecodedScript, from: usize, sigs: &[Vec<u8>]) -> ScriptBuf {
    let patterns = sigs.iter().filter_map(|s| push_pattern(s)).collect::<Vec<_>>();
    let mut ret = Vec::with_capacity(script.as_script().len() - from.min(script.as_script().len()));
    for pc in script.ops_from(from) {
        if script.get(pc) == Some(&Operation::Opcode(OP_CODESEPARATOR)) {
            continue;
        }
        let raw = script.raw_op(pc);
        if patterns.iter().any(|p| p.as_bytes() == raw) {
            continue;
        }
        ret.extend_from_slice(raw);
    }
    ScriptBuf::from_bytes(ret)
}

/// Checks a legacy ECDSA signature (DER + hash type byte) against `pk`.
///
/// Keys and signatures that don't parse make the check fail instead of
/// erroring, so that scripts can branch on the outcome.
pub fn check_sig_ecdsa(
    tx: &TxContext,
    sig: &[u8],
    pk: &[u8],
    script_code: &Script,
) -> Result<bool, ExecError> {
    let pk = match PublicKey::from_slice(pk) {
        Ok(pk) => pk,
        Err(_) => return Ok(false),
    };

    let (hashtype, der) = match sig.split_last() {
        Some((hashtype, der)) => (*hashtype, der),
        None => return Ok(false),
    };
    let mut sig = match ecdsa::Signature::from_der_lax(der) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    // libsecp256k1 only accepts low-S signatures
    sig.normalize_s();

    let sighash = tx.sighash(script_code, tx.input_idx(), hashtype as u32)?;
    let msg = Message::from_digest(sighash);
    Ok(SECP.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
