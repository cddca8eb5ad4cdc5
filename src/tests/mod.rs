
mod helpers {
    use bitcoin::absolute::LockTime;
    use bitcoin::hashes::Hash;
    use bitcoin::script::{Builder, PushBytes};
    use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

    use crate::*;

    /// Runs `script` without a transaction until it ends.
    pub fn run(script: &[u8]) -> (Stepper, StepOutcome) {
        run_with(script, None, Options::default())
    }

    pub fn run_with(script: &[u8], tx: Option<TxContext>, opts: Options) -> (Stepper, StepOutcome) {
        let mut stepper = Stepper::new(script, tx, opts);
        let end = stepper.run_to_completion();
        (stepper, end)
    }

    /// Main stack as hex strings, top first.
    pub fn stack_hex(stepper: &Stepper) -> Vec<String> {
        stepper.stack().map(|s| s.snapshot().to_hex()).unwrap_or_default()
    }

    pub fn error_kind(outcome: &StepOutcome) -> Option<ErrorKind> {
        match outcome {
            StepOutcome::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// A single push of `data`.
    pub fn push(data: &[u8]) -> Vec<u8> {
        let data = <&PushBytes>::try_from(data).unwrap();
        Builder::new().push_slice(data).into_script().into_bytes()
    }

    /// Concatenates pushes of `items`.
    pub fn pushes(items: &[&[u8]]) -> Vec<u8> {
        items.iter().flat_map(|i| push(i)).collect()
    }

    pub fn spending_tx(inputs: usize) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: (0..inputs)
                .map(|i| TxIn {
                    previous_output: OutPoint {
                        txid: Txid::all_zeros(),
                        vout: i as u32,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(90_000),
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            }],
        }
    }

    pub struct Key {
        pub sk: SecretKey,
        pub pk: Vec<u8>,
    }

    pub fn key(seed: u8) -> Key {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk).serialize().to_vec();
        Key { sk, pk }
    }

    /// Signs input `ctx.input_idx()` over `script_code` with SIGHASH_ALL,
    /// returning DER plus hash type byte.
    pub fn sign(ctx: &TxContext, script_code: &[u8], key: &Key) -> Vec<u8> {
        let secp = Secp256k1::new();
        let sighash = ctx
            .sighash(Script::from_bytes(script_code), ctx.input_idx(), 0x01)
            .unwrap();
        let sig = secp.sign_ecdsa(&Message::from_digest(sighash), &key.sk);
        let mut ret = sig.serialize_der().to_vec();
        ret.push(0x01);
        ret
    }
}
