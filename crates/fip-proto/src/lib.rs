//! Signature model (C2) and tagged-union message codec (C3) for the Flint
//! Interop Protocol.
//!
//! Built on [`fip_types`]'s recursive `Type` tree and byte cursor.

mod constants;
mod frame;
mod message;
mod signature;

pub use constants::*;
pub use frame::{decode_frame, encode_frame};
pub use message::{KillReason, Message, TargetTriple};
pub use signature::{DataSig, DataValue, EnumSig, FnSig, Signature, SymbolType};
