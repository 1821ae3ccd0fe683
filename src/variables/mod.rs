//! Variable collections backing run-time string expansion and setvar state.

mod collection;
mod tx;

pub use collection::{Collection, HashMapCollection, MutableCollection};
pub use tx::TxCollection;
