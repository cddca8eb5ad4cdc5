//! Opcode semantics.
//!
//! Every known opcode maps to an [OpSpec]: the main stack depth it needs,
//! whether it needs a bound transaction, and the handler performing it.
//! Handlers return the action text for the step log and must leave the stacks
//! untouched when they fail.

use core::cmp;

use bitcoin::hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash};
use bitcoin::hex::DisplayHex;
use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;

use crate::decode::{DecodedScript, Operation};
use crate::signatures::{check_sig_ecdsa, script_code};
use crate::stack::cast_to_bool;
use crate::state::ExecState;
use crate::tx::TxContext;
use crate::{ErrorKind, ExecError, Options, Stack};

/// Maximum number of public keys per multisig.
const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

type Handler = fn(&mut Ctx) -> Result<String, ExecError>;

/// Static description of an opcode.
#[derive(Clone, Copy)]
pub struct OpSpec {
    /// Main stack depth checked before the handler runs.
    pub min_depth: usize,
    /// Whether the opcode computes a signature hash.
    pub needs_tx: bool,
    /// Whether the opcode is processed inside not-taken branches.
    pub flow: bool,
    handler: Handler,
}

fn spec(min_depth: usize, handler: Handler) -> OpSpec {
    OpSpec {
        min_depth,
        needs_tx: false,
        flow: false,
        handler,
    }
}

/// Everything a handler gets to see.
pub struct Ctx<'a> {
    pub op: Opcode,
    pub state: &'a mut ExecState,
    pub script: &'a DecodedScript,
    pub tx: Option<&'a TxContext>,
    pub opts: &'a Options,
}

impl<'a> Ctx<'a> {
    fn stack(&mut self) -> &mut Stack {
        self.state.stack_mut()
    }

    fn num(&self, offset: isize) -> Result<i64, ExecError> {
        self.state
            .stack()
            .topnum(offset, self.opts.require_minimal)
    }

    fn tx(&self) -> Result<&'a TxContext, ExecError> {
        self.tx.ok_or_else(missing_tx)
    }
}

fn missing_tx() -> ExecError {
    ExecError::new(
        ErrorKind::MissingTransactionContext,
        "no spending transaction bound",
    )
}

fn hex(v: &[u8]) -> String {
    if v.is_empty() {
        "<empty>".to_owned()
    } else {
        v.to_lower_hex_string()
    }
}

/// Opcodes that fail wherever they appear, even in not-taken branches.
pub fn is_disabled(op: Opcode) -> bool {
    matches!(
        op,
        OP_CAT
            | OP_SUBSTR
            | OP_LEFT
            | OP_RIGHT
            | OP_INVERT
            | OP_AND
            | OP_OR
            | OP_XOR
            | OP_2MUL
            | OP_2DIV
            | OP_MUL
            | OP_DIV
            | OP_MOD
            | OP_LSHIFT
            | OP_RSHIFT
            | OP_RESERVED
            | OP_VER
            | OP_VERIF
            | OP_VERNOTIF
            | OP_RESERVED1
            | OP_RESERVED2
    )
}

/// Looks up the semantics of `op`. Returns [None] for unknown opcodes.
pub fn lookup(op: Opcode) -> Option<OpSpec> {
    let ret = match op {
        //
        // Push value
        OP_PUSHNUM_NEG1 | OP_PUSHNUM_1 | OP_PUSHNUM_2 | OP_PUSHNUM_3 | OP_PUSHNUM_4
        | OP_PUSHNUM_5 | OP_PUSHNUM_6 | OP_PUSHNUM_7 | OP_PUSHNUM_8 | OP_PUSHNUM_9
        | OP_PUSHNUM_10 | OP_PUSHNUM_11 | OP_PUSHNUM_12 | OP_PUSHNUM_13 | OP_PUSHNUM_14
        | OP_PUSHNUM_15 | OP_PUSHNUM_16 => spec(0, op_pushnum),

        //
        // Control
        // OP_CLTV and OP_CSV are noop
        OP_NOP | OP_NOP1 | OP_CLTV | OP_CSV | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7
        | OP_NOP8 | OP_NOP9 | OP_NOP10 => spec(0, op_nop),
        OP_IF | OP_NOTIF => OpSpec {
            flow: true,
            ..spec(1, op_if)
        },
        OP_ELSE => OpSpec {
            flow: true,
            ..spec(0, op_else)
        },
        OP_ENDIF => OpSpec {
            flow: true,
            ..spec(0, op_endif)
        },
        OP_VERIFY => spec(1, op_verify),
        OP_RETURN => spec(0, op_return),

        //
        // Stack operations
        OP_TOALTSTACK => spec(1, op_toaltstack),
        OP_FROMALTSTACK => spec(0, op_fromaltstack),
        OP_2DROP => spec(2, op_2drop),
        OP_2DUP => spec(2, op_2dup),
        OP_3DUP => spec(3, op_3dup),
        OP_2OVER => spec(4, op_2over),
        OP_2ROT => spec(6, op_2rot),
        OP_2SWAP => spec(4, op_2swap),
        OP_IFDUP => spec(1, op_ifdup),
        OP_DEPTH => spec(0, op_depth),
        OP_DROP => spec(1, op_drop),
        OP_DUP => spec(1, op_dup),
        OP_NIP => spec(2, op_nip),
        OP_OVER => spec(2, op_over),
        OP_PICK | OP_ROLL => spec(1, op_pick_roll),
        OP_ROT => spec(3, op_rot),
        OP_SWAP => spec(2, op_swap),
        OP_TUCK => spec(2, op_tuck),
        OP_SIZE => spec(1, op_size),

        //
        // Bitwise logic
        OP_EQUAL | OP_EQUALVERIFY => spec(2, op_equal),

        //
        // Numeric
        OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => spec(1, op_unary),
        OP_ADD
        | OP_SUB
        | OP_BOOLAND
        | OP_BOOLOR
        | OP_NUMEQUAL
        | OP_NUMEQUALVERIFY
        | OP_NUMNOTEQUAL
        | OP_LESSTHAN
        | OP_GREATERTHAN
        | OP_LESSTHANOREQUAL
        | OP_GREATERTHANOREQUAL
        | OP_MIN
        | OP_MAX => spec(2, op_binary),
        OP_WITHIN => spec(3, op_within),

        //
        // Crypto
        OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => spec(1, op_hash),
        OP_CODESEPARATOR => spec(0, op_codeseparator),
        OP_CHECKSIG | OP_CHECKSIGVERIFY => OpSpec {
            needs_tx: true,
            ..spec(2, op_checksig)
        },
        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => OpSpec {
            needs_tx: true,
            ..spec(1, op_checkmultisig)
        },

        _ => return None,
    };
    Some(ret)
}

/// Executes a single operation against `state`, returning the action text.
///
/// The program counter is not advanced; that is up to the caller.
pub fn execute(
    operation: &Operation,
    state: &mut ExecState,
    script: &DecodedScript,
    tx: Option<&TxContext>,
    opts: &Options,
) -> Result<String, ExecError> {
    let op = match operation {
        Operation::Push(data) => return exec_push(state, data),
        Operation::Opcode(op) => *op,
    };

    if is_disabled(op) {
        return Err(ExecError::new(
            ErrorKind::DisabledOpcode,
            format!("{} is disabled", op),
        ));
    }

    let executing = state.executing();
    let spec = match lookup(op) {
        Some(spec) => spec,
        None if executing => {
            return Err(ExecError::new(
                ErrorKind::UnknownOpcode,
                format!("unknown opcode 0x{:02x} ({})", op.to_u8(), op),
            ));
        }
        None => return Ok(format!("skipped {} (branch not taken)", op)),
    };

    if !executing && !spec.flow {
        return Ok(format!("skipped {} (branch not taken)", op));
    }

    if executing {
        if spec.needs_tx && tx.is_none() {
            return Err(missing_tx().in_op(op));
        }
        state.stack().needn(spec.min_depth).map_err(|e| e.in_op(op))?;
    }

    let mut ctx = Ctx {
        op,
        state: &mut *state,
        script,
        tx,
        opts,
    };
    let action = (spec.handler)(&mut ctx).map_err(|e| e.in_op(op))?;
    state.check_size()?;
    Ok(action)
}

fn exec_push(state: &mut ExecState, data: &[u8]) -> Result<String, ExecError> {
    if !state.executing() {
        return Ok(format!(
            "skipped push of {} byte(s) (branch not taken)",
            data.len()
        ));
    }
    state.push_main(data.to_vec());
    state.check_size()?;
    Ok(format!("pushed {} byte(s): {}", data.len(), hex(data)))
}

fn op_pushnum(ctx: &mut Ctx) -> Result<String, ExecError> {
    let n = ctx.op.to_u8() as i64 - (OP_PUSHNUM_1.to_u8() as i64 - 1);
    ctx.stack().pushnum(n);
    Ok(format!("pushed number {}", n))
}

fn op_nop(ctx: &mut Ctx) -> Result<String, ExecError> {
    match ctx.op {
        OP_CLTV | OP_CSV => Ok(format!("{} treated as no-op", ctx.op)),
        _ => Ok("no operation".to_owned()),
    }
}

fn op_if(ctx: &mut Ctx) -> Result<String, ExecError> {
    if !ctx.state.executing() {
        ctx.state.enter_branch(false);
        return Ok("opened branch inside a not-taken branch, not taken".to_owned());
    }

    let top = ctx.state.pop_main()?;
    let value = cast_to_bool(&top);
    let taken = if ctx.op == OP_NOTIF { !value } else { value };
    ctx.state.enter_branch(taken);
    Ok(format!(
        "popped {} ({}), branch {}",
        hex(&top),
        value,
        if taken { "taken" } else { "not taken" }
    ))
}

fn op_else(ctx: &mut Ctx) -> Result<String, ExecError> {
    ctx.state.else_branch()?;
    if ctx.state.executing() {
        Ok("switched to else branch, now executing".to_owned())
    } else {
        Ok("switched to else branch, now skipping".to_owned())
    }
}

fn op_endif(ctx: &mut Ctx) -> Result<String, ExecError> {
    ctx.state.exit_branch()?;
    Ok(format!(
        "closed branch, {} still open",
        ctx.state.branches().len()
    ))
}

fn op_verify(ctx: &mut Ctx) -> Result<String, ExecError> {
    let top = ctx.stack().top(-1)?.clone();
    if !cast_to_bool(&top) {
        return Err(ExecError::new(
            ErrorKind::VerifyFailed,
            format!("top item {} is false", hex(&top)),
        ));
    }
    ctx.stack().pop();
    Ok(format!("popped {}, verified true", hex(&top)))
}

fn op_return(_ctx: &mut Ctx) -> Result<String, ExecError> {
    Err(ExecError::new(
        ErrorKind::VerifyFailed,
        "script is marked unspendable",
    ))
}

fn op_toaltstack(ctx: &mut Ctx) -> Result<String, ExecError> {
    let top = ctx.state.pop_main()?;
    let ret = format!("moved {} to alt stack", hex(&top));
    ctx.state.push_alt(top);
    Ok(ret)
}

fn op_fromaltstack(ctx: &mut Ctx) -> Result<String, ExecError> {
    let top = ctx.state.pop_alt()?;
    let ret = format!("moved {} from alt stack", hex(&top));
    ctx.state.push_main(top);
    Ok(ret)
}

fn op_2drop(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- )
    ctx.stack().popn(2)?;
    Ok("dropped top two items".to_owned())
}

fn op_2dup(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- x1 x2 x1 x2)
    let x1 = ctx.stack().top(-2)?.clone();
    let x2 = ctx.stack().top(-1)?.clone();
    ctx.stack().push(x1);
    ctx.stack().push(x2);
    Ok("duplicated top two items".to_owned())
}

fn op_3dup(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 x3 -- x1 x2 x3 x1 x2 x3)
    let x1 = ctx.stack().top(-3)?.clone();
    let x2 = ctx.stack().top(-2)?.clone();
    let x3 = ctx.stack().top(-1)?.clone();
    ctx.stack().push(x1);
    ctx.stack().push(x2);
    ctx.stack().push(x3);
    Ok("duplicated top three items".to_owned())
}

fn op_2over(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 x3 x4 -- x1 x2 x3 x4 x1 x2)
    let x1 = ctx.stack().top(-4)?.clone();
    let x2 = ctx.stack().top(-3)?.clone();
    ctx.stack().push(x1);
    ctx.stack().push(x2);
    Ok("copied third and fourth items to the top".to_owned())
}

fn op_2rot(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 x3 x4 x5 x6 -- x3 x4 x5 x6 x1 x2)
    let at = ctx.stack().len() - 6;
    let x1 = ctx.stack().remove(at);
    let x2 = ctx.stack().remove(at);
    ctx.stack().push(x1);
    ctx.stack().push(x2);
    Ok("moved fifth and sixth items to the top".to_owned())
}

fn op_2swap(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 x3 x4 -- x3 x4 x1 x2)
    let at = ctx.stack().len() - 4;
    let x1 = ctx.stack().remove(at);
    let x2 = ctx.stack().remove(at);
    ctx.stack().push(x1);
    ctx.stack().push(x2);
    Ok("swapped the top two pairs".to_owned())
}

fn op_ifdup(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x - 0 | x x)
    let top = ctx.stack().top(-1)?.clone();
    if cast_to_bool(&top) {
        ctx.stack().push(top.clone());
        Ok(format!("top {} is true, duplicated", hex(&top)))
    } else {
        Ok(format!("top {} is false, not duplicated", hex(&top)))
    }
}

fn op_depth(ctx: &mut Ctx) -> Result<String, ExecError> {
    // -- stacksize
    let depth = ctx.stack().len();
    ctx.stack().pushnum(depth as i64);
    Ok(format!("pushed stack depth {}", depth))
}

fn op_drop(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x -- )
    let top = ctx.stack().popstr()?;
    Ok(format!("dropped {}", hex(&top)))
}

fn op_dup(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x -- x x)
    let top = ctx.stack().top(-1)?.clone();
    let ret = format!("duplicated {}", hex(&top));
    ctx.stack().push(top);
    Ok(ret)
}

fn op_nip(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- x2)
    let at = ctx.stack().len() - 2;
    let x1 = ctx.stack().remove(at);
    Ok(format!("removed second item {}", hex(&x1)))
}

fn op_over(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- x1 x2 x1)
    let under_top = ctx.stack().top(-2)?.clone();
    let ret = format!("copied second item {} to the top", hex(&under_top));
    ctx.stack().push(under_top);
    Ok(ret)
}

fn op_pick_roll(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (xn ... x2 x1 x0 n - xn ... x2 x1 x0 xn)
    // (xn ... x2 x1 x0 n - ... x2 x1 x0 xn)
    let n = ctx.num(-1)?;
    let depth = ctx.stack().len() as i64 - 1;
    if n < 0 || n >= depth {
        return Err(ExecError::new(
            ErrorKind::StackUnderflow,
            format!("index {} out of range for {} item(s)", n, depth),
        ));
    }
    ctx.stack().pop();
    let at = ctx.stack().len() - n as usize - 1;
    let item = if ctx.op == OP_ROLL {
        ctx.stack().remove(at)
    } else {
        ctx.stack().top(-(n as isize) - 1)?.clone()
    };
    let ret = format!(
        "{} item {} ({}) to the top",
        if ctx.op == OP_ROLL { "moved" } else { "copied" },
        n,
        hex(&item)
    );
    ctx.stack().push(item);
    Ok(ret)
}

fn op_rot(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 x3 -- x2 x3 x1)
    let at = ctx.stack().len() - 3;
    let x1 = ctx.stack().remove(at);
    ctx.stack().push(x1);
    Ok("rotated third item to the top".to_owned())
}

fn op_swap(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- x2 x1)
    let at = ctx.stack().len() - 2;
    let x1 = ctx.stack().remove(at);
    ctx.stack().push(x1);
    Ok("swapped top two items".to_owned())
}

fn op_tuck(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- x2 x1 x2)
    let x2 = ctx.stack().top(-1)?.clone();
    let at = ctx.stack().len() - 2;
    let ret = format!("copied top {} below the second item", hex(&x2));
    ctx.stack().insert(at, x2);
    Ok(ret)
}

fn op_size(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (in -- in size)
    let size = ctx.stack().top(-1)?.len();
    ctx.stack().pushnum(size as i64);
    Ok(format!("pushed size {} of top item", size))
}

fn op_equal(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 - bool)
    let x1 = ctx.stack().top(-2)?.clone();
    let x2 = ctx.stack().top(-1)?.clone();
    let equal = x1 == x2;
    if ctx.op == OP_EQUALVERIFY {
        if !equal {
            return Err(ExecError::new(
                ErrorKind::VerifyFailed,
                format!("{} != {}", hex(&x1), hex(&x2)),
            ));
        }
        ctx.stack().popn(2)?;
        return Ok(format!("popped two equal items {}", hex(&x1)));
    }
    ctx.stack().popn(2)?;
    ctx.stack().pushbool(equal);
    Ok(format!(
        "popped {} and {}, pushed {}",
        hex(&x1),
        hex(&x2),
        if equal { "true" } else { "false" }
    ))
}

fn op_unary(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (in -- out)
    let x = ctx.num(-1)?;
    let res = match ctx.op {
        OP_1ADD => x + 1,
        OP_1SUB => x - 1,
        OP_NEGATE => -x,
        OP_ABS => x.abs(),
        OP_NOT => (x == 0) as i64,
        OP_0NOTEQUAL => (x != 0) as i64,
        _ => unreachable!("dispatched by lookup"),
    };
    ctx.stack().pop();
    ctx.stack().pushnum(res);
    Ok(format!("popped {}, pushed {}", x, res))
}

fn op_binary(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x1 x2 -- out)
    let x1 = ctx.num(-2)?;
    let x2 = ctx.num(-1)?;
    let res = match ctx.op {
        OP_ADD => x1 + x2,
        OP_SUB => x1 - x2,
        OP_BOOLAND => (x1 != 0 && x2 != 0) as i64,
        OP_BOOLOR => (x1 != 0 || x2 != 0) as i64,
        OP_NUMEQUAL | OP_NUMEQUALVERIFY => (x1 == x2) as i64,
        OP_NUMNOTEQUAL => (x1 != x2) as i64,
        OP_LESSTHAN => (x1 < x2) as i64,
        OP_GREATERTHAN => (x1 > x2) as i64,
        OP_LESSTHANOREQUAL => (x1 <= x2) as i64,
        OP_GREATERTHANOREQUAL => (x1 >= x2) as i64,
        OP_MIN => cmp::min(x1, x2),
        OP_MAX => cmp::max(x1, x2),
        _ => unreachable!("dispatched by lookup"),
    };
    if ctx.op == OP_NUMEQUALVERIFY {
        if res == 0 {
            return Err(ExecError::new(
                ErrorKind::VerifyFailed,
                format!("{} != {}", x1, x2),
            ));
        }
        ctx.stack().popn(2)?;
        return Ok(format!("popped {} and {}, numerically equal", x1, x2));
    }
    ctx.stack().popn(2)?;
    ctx.stack().pushnum(res);
    Ok(format!("popped {} and {}, pushed {}", x1, x2, res))
}

fn op_within(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (x min max -- out)
    let x = ctx.num(-3)?;
    let min = ctx.num(-2)?;
    let max = ctx.num(-1)?;
    let res = min <= x && x < max;
    ctx.stack().popn(3)?;
    ctx.stack().pushbool(res);
    Ok(format!(
        "{} is {}within [{}, {}), pushed {}",
        x,
        if res { "" } else { "not " },
        min,
        max,
        res
    ))
}

fn op_hash(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (in -- hash)
    let top = ctx.stack().popstr()?;
    let digest = match ctx.op {
        OP_RIPEMD160 => ripemd160::Hash::hash(&top).to_byte_array().to_vec(),
        OP_SHA1 => sha1::Hash::hash(&top).to_byte_array().to_vec(),
        OP_SHA256 => sha256::Hash::hash(&top).to_byte_array().to_vec(),
        OP_HASH160 => hash160::Hash::hash(&top).to_byte_array().to_vec(),
        OP_HASH256 => sha256d::Hash::hash(&top).to_byte_array().to_vec(),
        _ => unreachable!("dispatched by lookup"),
    };
    let ret = format!("hashed {} byte(s), pushed {}", top.len(), hex(&digest));
    ctx.stack().push(digest);
    Ok(ret)
}

fn op_codeseparator(ctx: &mut Ctx) -> Result<String, ExecError> {
    // script-code starts right after this opcode
    let pos = ctx.script.offset(ctx.state.pc() + 1);
    ctx.state.set_codesep_pos(pos);
    Ok(format!("script-code now starts at byte {}", pos))
}

fn op_checksig(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (sig pubkey -- bool)
    let tx = ctx.tx()?;
    let sig = ctx.stack().top(-2)?.clone();
    let pk = ctx.stack().top(-1)?.clone();

    let code = script_code(ctx.script, ctx.state.codesep_pos(), &[sig.clone()]);
    let ok = check_sig_ecdsa(tx, &sig, &pk, &code)?;

    if ctx.op == OP_CHECKSIGVERIFY {
        if !ok {
            return Err(ExecError::new(
                ErrorKind::VerifyFailed,
                format!("signature verification failed for key {}", hex(&pk)),
            ));
        }
        ctx.stack().popn(2)?;
        return Ok(format!("signature verified for key {}", hex(&pk)));
    }

    ctx.stack().popn(2)?;
    ctx.stack().pushbool(ok);
    if ok {
        Ok(format!("signature verified for key {}, pushed true", hex(&pk)))
    } else {
        Ok(format!(
            "signature verification failed for key {}, pushed false",
            hex(&pk)
        ))
    }
}

fn op_checkmultisig(ctx: &mut Ctx) -> Result<String, ExecError> {
    // (dummy sig1 .. sigm m pk1 .. pkn n -- bool)
    let tx = ctx.tx()?;

    let mut i: usize = 1;
    let nkeys = ctx.num(-(i as isize))?;
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&nkeys) {
        return Err(ExecError::new(
            ErrorKind::NumericOverflow,
            format!("public key count {} out of range", nkeys),
        ));
    }
    let nkeys = nkeys as usize;
    i += 1;
    let ikey = i;
    i += nkeys;
    ctx.state.stack().needn(i)?;

    let nsigs = ctx.num(-(i as isize))?;
    if nsigs < 0 || nsigs > nkeys as i64 {
        return Err(ExecError::new(
            ErrorKind::NumericOverflow,
            format!("signature count {} out of range for {} key(s)", nsigs, nkeys),
        ));
    }
    let nsigs = nsigs as usize;
    i += 1;
    let isig = i;
    i += nsigs;
    // the last of these is the extra dummy element
    ctx.state.stack().needn(i)?;

    let stack = ctx.state.stack();
    let keys = (0..nkeys)
        .map(|k| stack.top(-((ikey + k) as isize)).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let sigs = (0..nsigs)
        .map(|k| stack.top(-((isig + k) as isize)).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    let code = script_code(ctx.script, ctx.state.codesep_pos(), &sigs);

    // Signatures must match keys in order; a key can be used at most once.
    let mut matched = 0;
    let mut key_pos = 0;
    let mut success = true;
    while success && matched < nsigs {
        if check_sig_ecdsa(tx, &sigs[matched], &keys[key_pos], &code)? {
            matched += 1;
        }
        key_pos += 1;
        if nsigs - matched > nkeys - key_pos {
            success = false;
        }
    }

    let summary = format!(
        "{} of {} signature(s) matched against {} key(s)",
        matched, nsigs, nkeys
    );
    if ctx.op == OP_CHECKMULTISIGVERIFY {
        if !success {
            return Err(ExecError::new(ErrorKind::VerifyFailed, summary));
        }
        ctx.stack().popn(i)?;
        return Ok(summary);
    }

    ctx.stack().popn(i)?;
    ctx.stack().pushbool(success);
    Ok(format!("{}, pushed {}", summary, success))
}
