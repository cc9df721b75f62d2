use crate::renderer::{MeshPassType, PerPass};

/// Identity of a GPU descriptor set owned by the material system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorSetId(pub u64);

/// Identity of a graphics pipeline owned by the material system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u64);

/// A material as resolved for one pass. Two pass objects batch together only
/// when both identities match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassMaterial {
    pub descriptor_set: DescriptorSetId,
    pub pipeline: PipelineId,
}

impl PassMaterial {
    pub const fn new(descriptor_set: u64, pipeline: u64) -> Self {
        Self {
            descriptor_set: DescriptorSetId(descriptor_set),
            pipeline: PipelineId(pipeline),
        }
    }
}

/// Material as seen by the batching core: which passes it has a shader for,
/// and what that shader binds.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub passes: PerPass<Option<PassMaterial>>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: PerPass::default(),
        }
    }

    pub fn with_pass(mut self, pass: MeshPassType, material: PassMaterial) -> Self {
        self.passes[pass] = Some(material);
        self
    }

    pub fn resolve(&self, pass: MeshPassType) -> Option<PassMaterial> {
        self.passes[pass]
    }

    pub fn has_pass(&self, pass: MeshPassType) -> bool {
        self.passes[pass].is_some()
    }
}
