//! Filesystem operations used by the movers.
//! Copies always land in a hidden temp sibling first and are renamed over the
//! final path, so a destination is never observed half-written.

mod atomic;
mod copy;
mod helpers;
mod io_copy;
mod meta;
mod util;

pub use copy::copy_over;
pub use helpers::io_hint;
pub use util::is_staging_temp;
