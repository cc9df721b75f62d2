pub mod batches;
pub mod buffers;

pub(crate) use buffers::{MergedGeometry, ObjectBuffer, PassBuffers};
