pub mod asset;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use asset::{Handle, Material, MeshGeometry, PassMaterial, RenderBounds};
pub use renderer::{
    IndirectBatch, IndirectDrawRecord, InstanceRecord, MeshPassType, Multibatch,
    ObjectDataRecord,
};
pub use scene::{DrawPassFlags, FrameBatchStats, MeshObject, RenderObject, RenderScene};
pub use settings::BatchSettings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
