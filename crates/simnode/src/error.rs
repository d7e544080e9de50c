use std::fmt;

use memwallet::Poisoned;
use memwallet_consensus::Amount;
use memwallet_pow::SolveError;
use memwallet_primitives::{DecodeError, OutPoint};
use memwallet_script::ScriptError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimNodeError {
    Decode(DecodeError),
    Script(ScriptError),
    Solve(SolveError),
    CoinbaseNotAllowed,
    NoInputs,
    MissingInput(OutPoint),
    DoubleSpend(OutPoint),
    ImmatureSpend {
        outpoint: OutPoint,
        maturity_height: u32,
    },
    InsufficientInput {
        input: Amount,
        output: Amount,
    },
    OutputOutOfRange(Amount),
    InvalidateGenesis,
    UnknownHeight(u32),
    DispatchStopped,
    Poisoned(&'static str),
}

impl fmt::Display for SimNodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimNodeError::Decode(err) => write!(f, "decode failed: {err}"),
            SimNodeError::Script(err) => write!(f, "script construction failed: {err}"),
            SimNodeError::Solve(err) => write!(f, "unable to solve block: {err}"),
            SimNodeError::CoinbaseNotAllowed => {
                write!(f, "coinbase transactions cannot be relayed")
            }
            SimNodeError::NoInputs => write!(f, "transaction has no inputs"),
            SimNodeError::MissingInput(outpoint) => {
                write!(f, "input {outpoint} is unknown or already spent")
            }
            SimNodeError::DoubleSpend(outpoint) => {
                write!(f, "input {outpoint} is already spent in the mempool")
            }
            SimNodeError::ImmatureSpend {
                outpoint,
                maturity_height,
            } => write!(
                f,
                "coinbase output {outpoint} is immature until height {maturity_height}"
            ),
            SimNodeError::InsufficientInput { input, output } => {
                write!(f, "outputs {output} exceed inputs {input}")
            }
            SimNodeError::OutputOutOfRange(value) => {
                write!(f, "output value {value} out of range")
            }
            SimNodeError::InvalidateGenesis => write!(f, "cannot invalidate the genesis block"),
            SimNodeError::UnknownHeight(height) => write!(f, "no block at height {height}"),
            SimNodeError::DispatchStopped => write!(f, "notification dispatcher stopped"),
            SimNodeError::Poisoned(lock) => write!(f, "{lock} lock poisoned"),
        }
    }
}

impl std::error::Error for SimNodeError {}

impl From<DecodeError> for SimNodeError {
    fn from(err: DecodeError) -> Self {
        SimNodeError::Decode(err)
    }
}

impl From<ScriptError> for SimNodeError {
    fn from(err: ScriptError) -> Self {
        SimNodeError::Script(err)
    }
}

impl From<Poisoned> for SimNodeError {
    fn from(err: Poisoned) -> Self {
        SimNodeError::Poisoned(err.0)
    }
}

impl From<SolveError> for SimNodeError {
    fn from(err: SolveError) -> Self {
        SimNodeError::Solve(err)
    }
}
