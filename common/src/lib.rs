// Arbor common library - shared block and transaction definitions

pub mod block;
pub mod crypto;
pub mod genesis;
pub mod hash;
pub mod tx;

// Flattened re-exports
pub use self::block::*;
pub use self::hash::*;
pub use self::tx::*;
