//! Verification of addresses, coordinator prebuilds and input signatures.
pub mod address;
pub mod prebuild;
mod signature;

pub use address::verify_address;
pub use prebuild::{
    KeySignatures, PrebuildInfo, PrebuildVerifier, Recipient, TransactionPrebuild,
    VerificationPolicy, VerifiedPrebuild, WalletKeychains,
};
pub use signature::{
    check_signature, parse_signature_script, verify_signature, InputScriptType,
    ParsedSignatureScript, VerificationMode,
};
