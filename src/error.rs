use thiserror::Error;

use crate::indexer::IndexerError;
use crate::signer::SigningFailure;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine.
///
/// The first group are the policy and verification failures callers are
/// expected to match on. The second group covers structural problems with the
/// data handed in and failures of external collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller violated an input invariant (bad threshold, recipient count, ...)
    #[error("policy violation: {0}")]
    Policy(String),

    #[error("expected recipient {address} with amount {amount} not found in transaction")]
    MissingRecipient { address: String, amount: u64 },

    #[error(
        "prebuild attempts to spend {unauthorized} to external outputs which were not requested, \
         exceeding the limit of {limit} (1.5% of the intended external spend {intended})"
    )]
    UnauthorizedSpend {
        unauthorized: u64,
        limit: u64,
        intended: u64,
    },

    #[error("could not resolve value of input {input_index} ({outpoint}): {reason}")]
    UnresolvedInput {
        input_index: usize,
        outpoint: String,
        reason: String,
    },

    #[error(
        "attempting to spend {output_amount} satoshis, which exceeds the input amount \
         ({input_amount} satoshis) by {} satoshis", .output_amount - .input_amount
    )]
    NegativeFee {
        input_amount: u64,
        output_amount: u64,
    },

    #[error(transparent)]
    Signing(#[from] SigningFailure),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("recovery from {source_coin} to {recovery_coin} is not supported")]
    UnsupportedRecoveryPair {
        source_coin: String,
        recovery_coin: String,
    },

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid keychain signature: {0}")]
    KeySignature(String),

    #[error("address mismatch: expected {expected}, derived {derived}")]
    AddressMismatch { expected: String, derived: String },

    #[error("recovery transaction verification failed: {0}")]
    RecoveryVerification(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Indexer {
        context: String,
        #[source]
        source: IndexerError,
    },
}

impl Error {
    pub fn policy(message: impl Into<String>) -> Self {
        Error::Policy(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Wrap a collaborator failure with the step it happened in.
    pub fn indexer(context: impl Into<String>, source: IndexerError) -> Self {
        Error::Indexer {
            context: context.into(),
            source,
        }
    }
}

impl From<crate::bitcoin::bip32::Error> for Error {
    fn from(e: crate::bitcoin::bip32::Error) -> Self {
        Error::Key(e.to_string())
    }
}
