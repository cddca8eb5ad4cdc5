use bitcoin::hex::FromHex;
use bitcoin::ScriptBuf;
use wasm_bindgen::prelude::*;

use crate::*;

/// Decode compiled script hex into ASM.
#[wasm_bindgen]
pub fn script_hex_to_asm(script_hex: &str) -> Result<String, JsValue> {
    let script = ScriptBuf::from_hex(script_hex).map_err(|e| format!("invalid hex: {}", e))?;
    Ok(script.to_asm_string())
}

/// Run the given script, optionally against a spending transaction.
///
/// Fields on the return value are:
/// - script_hex, script_asm: the script that ran (absent if it does not decode)
/// - txid, input_index: the bound transaction, if any
/// - steps: list of executed steps with pc, op, action and stack
/// - result:
///   - success: bool
///   - final_stack: list of hex stack items after execution, top first
///   - error_kind, error: (optional) error that caused execution halt
///   - opcode: (optional) opcode that produced the error
#[wasm_bindgen]
pub fn run_script(
    script_hex: &str,
    tx_hex: Option<String>,
    input_idx: usize,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let script = Vec::<u8>::from_hex(script_hex.trim())
        .map_err(|e| format!("invalid hex script: {}", e))?;
    let tx = match tx_hex {
        Some(hex) => Some(TxContext::bind_hex(&hex, input_idx).map_err(|e| e.to_string())?),
        None => None,
    };

    let mut stepper = Stepper::new(&script, tx, Options::default());
    let ret = json::run_to_json(&mut stepper).map_err(|e| e.to_string())?;
    Ok(serde_wasm_bindgen::to_value(&ret)?)
}
