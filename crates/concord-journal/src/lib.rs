pub mod entry;
pub mod traits;

#[cfg(feature = "memory-journal")]
pub mod memory;

#[cfg(feature = "merkle-journal")]
pub mod merkle;

pub use entry::*;
pub use traits::*;

#[cfg(feature = "memory-journal")]
pub use memory::*;

#[cfg(feature = "merkle-journal")]
pub use merkle::*;
