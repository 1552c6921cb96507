//! # Neo Primitives
//!
//! Fundamental types shared by the dBFT engine and its crypto layer:
//! - `UInt160`: 160-bit value (script hashes, next-consensus addresses)
//! - `UInt256`: 256-bit value (transaction, block and payload hashes)
//! - `VerifyResult`: outcome of transaction verification by the chain
//!
//! ## Example
//!
//! ```rust
//! use neo_primitives::{UInt160, UInt256};
//!
//! let hash = UInt256::zero();
//! assert!(hash.is_zero());
//!
//! let script_hash = UInt160::from_script(&[0x40]);
//! assert!(!script_hash.is_zero());
//! ```

pub mod error;
pub mod hash;
pub mod uint160;
pub mod uint256;
pub mod verify_result;


// Re-exports
pub use error::{PrimitiveError, PrimitiveResult};
pub use hash::{hash160, sha256};
pub use uint160::{UInt160, UINT160_SIZE};
pub use uint256::{UInt256, UINT256_SIZE};
pub use verify_result::VerifyResult;
