//! On-disk stores for preprocessed data.
//!
//! Both stores keep a small JSON header next to raw `f32`/`u32` payloads
//! written with `bytemuck`, so values round-trip bit-exactly.

mod barycentric;
mod gpc;

pub use barycentric::{load_barycentric, save_barycentric};
pub use gpc::GpcStore;

const FORMAT_VERSION: u32 = 1;

fn native_little_endian() -> bool {
    cfg!(target_endian = "little")
}
