pub(crate) mod internal;
pub mod objects;
pub mod pass;

pub use objects::{IndirectDrawRecord, InstanceRecord, ObjectDataRecord};
pub use pass::{
    IndirectBatch, MeshPass, MeshPassType, Multibatch, PassObject, PerPass, RenderBatch,
};
