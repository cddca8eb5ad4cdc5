use std::process;

use bitcoin::hex::FromHex;
use clap::Parser;

use bitcoin_scriptstep::*;

#[derive(Parser)]
#[command(version, about = "Step through a Bitcoin script, one operation at a time")]
struct Args {
	/// the script to run, in hex
	#[arg(required = true)]
	script_hex: String,
	/// spending transaction in hex, needed by the signature opcodes
	#[arg(long)]
	tx: Option<String>,
	/// index of the transaction input being evaluated
	#[arg(long, default_value_t = 0)]
	input: usize,
	/// reject numeric operands that are not minimally encoded
	#[arg(long)]
	require_minimal: bool,
	/// print the run as a JSON document
	#[arg(long)]
	json: bool,
	/// only print the final result
	#[arg(long)]
	quiet: bool,
}

fn inner_main() -> Result<bool, String> {
	let args = Args::parse();

	let script = Vec::<u8>::from_hex(args.script_hex.trim())
		.map_err(|e| format!("invalid script hex: {}", e))?;
	let tx = match args.tx {
		Some(ref hex) => Some(TxContext::bind_hex(hex, args.input).map_err(|e| e.to_string())?),
		None => None,
	};
	let opts = Options {
		require_minimal: args.require_minimal,
	};

	let mut stepper = Stepper::new(&script, tx, opts);

	if args.json {
		let doc = json::run_to_json(&mut stepper).map_err(|e| e.to_string())?;
		let out = serde_json::to_string_pretty(&doc).map_err(|e| e.to_string())?;
		println!("{}", out);
		return Ok(stepper.phase() == Phase::Finished);
	}

	if let Some(tx) = stepper.tx() {
		println!("Transaction: {} (input {} of {})", tx.txid(), tx.input_idx(), tx.input_count());
	}

	const SEP: &str = "--------------------------------------------------";
	println!("{}", SEP);
	let end = loop {
		match stepper.step() {
			StepOutcome::Continue(step) => {
				if !args.quiet {
					println!("{:>4}  {:<24} {}", step.pc, step.op, step.action);
					println!("      Stack: {}", step.stack);
				}
			}
			end => break end,
		}
	};
	println!("{}", SEP);

	match end {
		StepOutcome::Error(ref e) => println!("Execution failed. {}", e),
		_ => println!("End of script"),
	}
	if let Some(res) = stepper.result() {
		println!("Final stack: {}", res.final_stack);
		println!("Success: {}", res.success);
		if let Some(op) = res.opcode {
			println!("Failed on opcode: {}", op);
		}
	}
	Ok(stepper.phase() == Phase::Finished)
}

fn main() {
	env_logger::init();

	match inner_main() {
		Ok(true) => {}
		Ok(false) => process::exit(1),
		Err(e) => {
			eprintln!("ERROR: {}", e);
			process::exit(2);
		}
	}
}
