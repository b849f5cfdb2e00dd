//! Helpers that prepare decoded images for the inference engine.
//!
//! Available when the `image-io` feature is enabled.

mod batch;
mod letterbox;

pub use batch::append_nchw_batch;
pub use letterbox::{letterbox, letterbox_size};
