pub mod dynamic;
pub mod error;
pub mod hash;
pub mod header;
pub mod object;
pub mod sections;
mod versions;

pub use dynamic::ObjectFlag;
pub use error::ElfError;
pub use hash::*;
pub use header::*;
pub use object::*;
pub use sections::*;

use std::sync::Once;

static INIT: Once = Once::new();

/// Idempotent process-wide setup, run lazily before the first parse.
/// Safe to hit from any thread; later calls are no-ops.
pub(crate) fn ensure_init() {
    INIT.call_once(|| log::debug!("elf extraction engine initialized"));
}
