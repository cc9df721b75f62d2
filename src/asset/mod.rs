pub mod cache;
pub mod handle;
pub mod material;
pub mod mesh;

pub use cache::{identity_of, AssetCache, HandleRegistry};
pub use handle::Handle;
pub use material::{DescriptorSetId, Material, PassMaterial, PipelineId};
pub use mesh::{DrawMesh, GeometryBuffers, MeshGeometry, RenderBounds};
