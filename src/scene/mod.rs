// scene/mod.rs

pub mod dirty;
pub mod frame;
pub mod object;
pub mod render_scene;
mod upload;

pub use dirty::DirtyTracker;
pub use frame::{FrameBatchStats, PassStats};
pub use object::{DrawPassFlags, MaterialHandle, MeshObject, RenderObject};
pub use render_scene::{target_passes, MergeLayout, RenderScene};
