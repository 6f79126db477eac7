//! Shader resource reflection and the per-pipeline binding table built from it.
//!
//! Each stage's SPIR-V is reflected with `spirq` into a [`StageReflection`]; the stages of a
//! pipeline are then merged into one [`ShaderResourceTable`] keyed by binding index, which
//! drives the pipeline layout and name lookups.

use std::collections::{BTreeMap, HashMap};

use crate::error::{ErrorCode, GpuResult};
use crate::types::ShaderStages;

const SPIRV_MAGIC: u32 = 0x0723_0203;
const SPIRV_HEADER_WORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn flags(self) -> ShaderStages {
        match self {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
        }
    }
}

/// Every descriptor kind reflection can report, supported or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectedDescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    InputAttachment,
    AccelerationStructure,
}

/// Descriptor kinds a pipeline layout may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    CombinedImageSampler,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
}

impl ReflectedDescriptorType {
    pub fn supported(self) -> Option<DescriptorType> {
        match self {
            ReflectedDescriptorType::CombinedImageSampler => Some(DescriptorType::CombinedImageSampler),
            ReflectedDescriptorType::StorageImage => Some(DescriptorType::StorageImage),
            ReflectedDescriptorType::UniformBuffer => Some(DescriptorType::UniformBuffer),
            ReflectedDescriptorType::StorageBuffer => Some(DescriptorType::StorageBuffer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: ReflectedDescriptorType,
    /// Array dimensions, outermost first; empty for a single descriptor.
    pub array_dims: Vec<u32>,
}

impl ReflectedBinding {
    pub fn new(name: impl Into<String>, binding: u32, descriptor_type: ReflectedDescriptorType) -> Self {
        Self {
            name: name.into(),
            set: 0,
            binding,
            descriptor_type,
            array_dims: Vec::new(),
        }
    }

    pub fn with_array_dims(mut self, dims: &[u32]) -> Self {
        self.array_dims = dims.to_vec();
        self
    }

    /// Number of descriptors: the product of all array dimensions.
    pub fn count(&self) -> u32 {
        self.array_dims.iter().product()
    }
}

/// Descriptor bindings declared by one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReflection {
    pub stage: ShaderStage,
    pub bindings: Vec<ReflectedBinding>,
}

impl StageReflection {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: ReflectedBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Reflects the descriptor bindings of every entry point in `code`.
    pub fn from_spirv(stage: ShaderStage, code: &[u32]) -> GpuResult<Self> {
        if code.len() < SPIRV_HEADER_WORDS || code[0] != SPIRV_MAGIC {
            log::error!("{stage:?} shader: not a SPIR-V module ({} words)", code.len());
            return Err(ErrorCode::InvalidArgs);
        }
        let entry_points = spirq::ReflectConfig::new()
            .spv(code)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| {
                log::error!("{stage:?} shader: SPIR-V reflection failed: {e:?}");
                ErrorCode::InvalidArgs
            })?;
        if entry_points.is_empty() {
            log::error!("{stage:?} shader: module declares no entry point");
            return Err(ErrorCode::InvalidArgs);
        }

        let mut reflection = Self::new(stage);
        for entry_point in &entry_points {
            for var in entry_point.vars.iter() {
                if let spirq::var::Variable::Descriptor {
                    name,
                    desc_bind,
                    desc_ty,
                    nbind,
                    ..
                } = var
                {
                    let (set, binding) = (desc_bind.set(), desc_bind.bind());
                    if reflection
                        .bindings
                        .iter()
                        .any(|b| b.set == set && b.binding == binding)
                    {
                        continue;
                    }
                    if *nbind == 0 {
                        log::error!(
                            "{stage:?} shader: binding {binding} is a runtime-sized array"
                        );
                        return Err(ErrorCode::InvalidShaderResourceBinding);
                    }
                    let array_dims = if *nbind > 1 { vec![*nbind] } else { Vec::new() };
                    reflection.bindings.push(ReflectedBinding {
                        name: name.clone().unwrap_or_default(),
                        set,
                        binding,
                        descriptor_type: spirq_descriptor_type(desc_ty),
                        array_dims,
                    });
                }
            }
        }
        Ok(reflection)
    }
}

fn spirq_descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> ReflectedDescriptorType {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::Sampler() => ReflectedDescriptorType::Sampler,
        DescriptorType::CombinedImageSampler() => ReflectedDescriptorType::CombinedImageSampler,
        DescriptorType::SampledImage() => ReflectedDescriptorType::SampledImage,
        DescriptorType::StorageImage(..) => ReflectedDescriptorType::StorageImage,
        DescriptorType::UniformTexelBuffer() => ReflectedDescriptorType::UniformTexelBuffer,
        DescriptorType::StorageTexelBuffer(..) => ReflectedDescriptorType::StorageTexelBuffer,
        DescriptorType::UniformBuffer() => ReflectedDescriptorType::UniformBuffer,
        DescriptorType::StorageBuffer(..) => ReflectedDescriptorType::StorageBuffer,
        DescriptorType::InputAttachment(..) => ReflectedDescriptorType::InputAttachment,
        DescriptorType::AccelStruct() => ReflectedDescriptorType::AccelerationStructure,
    }
}

/// One entry of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStages,
}

/// Merged view of one named shader resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderResourceInfo {
    pub descriptor_type: DescriptorType,
    pub binding: u32,
    pub count: u32,
}

/// Bindings of all stages of a pipeline, merged by binding index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderResourceTable {
    bindings: BTreeMap<u32, LayoutBinding>,
    names: HashMap<String, u32>,
}

impl ShaderResourceTable {
    /// Merges a mandatory vertex stage with an optional fragment stage.
    pub fn from_stages(
        vertex: &StageReflection,
        fragment: Option<&StageReflection>,
    ) -> GpuResult<Self> {
        if vertex.stage != ShaderStage::Vertex {
            log::error!("pipeline: first stage is {:?}, expected Vertex", vertex.stage);
            return Err(ErrorCode::InvalidArgs);
        }
        let mut table = Self::default();
        table.add_stage(vertex)?;
        if let Some(fragment) = fragment {
            if fragment.stage != ShaderStage::Fragment {
                log::error!("pipeline: second stage is {:?}, expected Fragment", fragment.stage);
                return Err(ErrorCode::InvalidArgs);
            }
            table.add_stage(fragment)?;
        }
        Ok(table)
    }

    pub fn add_stage(&mut self, reflection: &StageReflection) -> GpuResult<()> {
        let stage = reflection.stage;
        for reflected in &reflection.bindings {
            let binding = reflected.binding;
            if reflected.set != 0 {
                log::error!(
                    "{stage:?} shader: '{}' uses descriptor set {}, only set 0 is supported",
                    reflected.name,
                    reflected.set
                );
                return Err(ErrorCode::InvalidShaderResourceBinding);
            }
            let Some(descriptor_type) = reflected.descriptor_type.supported() else {
                log::error!(
                    "{stage:?} shader: '{}' at binding {binding} has unsupported type {:?}",
                    reflected.name,
                    reflected.descriptor_type
                );
                return Err(ErrorCode::InvalidShaderResourceBinding);
            };
            let count = reflected.count();

            match self.bindings.get_mut(&binding) {
                None => {
                    self.bindings.insert(
                        binding,
                        LayoutBinding {
                            binding,
                            descriptor_type,
                            count,
                            stages: stage.flags(),
                        },
                    );
                }
                Some(existing) => {
                    if existing.descriptor_type != descriptor_type || existing.count != count {
                        log::error!(
                            "{stage:?} shader: binding {binding} is {descriptor_type:?}[{count}], \
                             earlier stage declared {:?}[{}]",
                            existing.descriptor_type,
                            existing.count
                        );
                        return Err(ErrorCode::InvalidShaderResourceBinding);
                    }
                    existing.stages |= stage.flags();
                }
            }

            if reflected.name.is_empty() {
                continue;
            }
            match self.names.get(&reflected.name) {
                Some(&known) if known != binding => {
                    log::error!(
                        "{stage:?} shader: '{}' bound at {binding}, earlier stage bound it at {known}",
                        reflected.name
                    );
                    return Err(ErrorCode::InvalidShaderResourceBinding);
                }
                Some(_) => {}
                None => {
                    self.names.insert(reflected.name.clone(), binding);
                }
            }
        }
        Ok(())
    }

    pub fn get_shader_resource_info(&self, name: &str) -> Option<ShaderResourceInfo> {
        let binding = self.names.get(name)?;
        self.bindings.get(binding).map(|b| ShaderResourceInfo {
            descriptor_type: b.descriptor_type,
            binding: b.binding,
            count: b.count,
        })
    }

    /// Bindings sorted by index, ready for layout creation.
    pub fn layout_bindings(&self) -> Vec<LayoutBinding> {
        self.bindings.values().copied().collect()
    }

    pub fn binding(&self, index: u32) -> Option<&LayoutBinding> {
        self.bindings.get(&index)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ubo(name: &str, binding: u32) -> ReflectedBinding {
        ReflectedBinding::new(name, binding, ReflectedDescriptorType::UniformBuffer)
    }

    #[test]
    fn shared_binding_merges_stage_flags() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(ubo("globals", 3));
        let fragment = StageReflection::new(ShaderStage::Fragment).with_binding(ubo("globals", 3));
        let table = ShaderResourceTable::from_stages(&vertex, Some(&fragment)).unwrap();

        let merged = table.binding(3).unwrap();
        assert_eq!(merged.stages, ShaderStages::VERTEX | ShaderStages::FRAGMENT);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(ubo("data", 3));
        let fragment = StageReflection::new(ShaderStage::Fragment).with_binding(ReflectedBinding::new(
            "data",
            3,
            ReflectedDescriptorType::StorageBuffer,
        ));
        assert_eq!(
            ShaderResourceTable::from_stages(&vertex, Some(&fragment)),
            Err(ErrorCode::InvalidShaderResourceBinding)
        );
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let sampler = |dims: &[u32]| {
            ReflectedBinding::new("textures", 1, ReflectedDescriptorType::CombinedImageSampler)
                .with_array_dims(dims)
        };
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(sampler(&[4]));
        let fragment = StageReflection::new(ShaderStage::Fragment).with_binding(sampler(&[2, 3]));
        assert_eq!(
            ShaderResourceTable::from_stages(&vertex, Some(&fragment)),
            Err(ErrorCode::InvalidShaderResourceBinding)
        );
    }

    #[test]
    fn array_count_is_product_of_dims() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(
            ReflectedBinding::new("shadow_maps", 2, ReflectedDescriptorType::CombinedImageSampler)
                .with_array_dims(&[2, 3]),
        );
        let table = ShaderResourceTable::from_stages(&vertex, None).unwrap();
        let info = table.get_shader_resource_info("shadow_maps").unwrap();
        assert_eq!(
            info,
            ShaderResourceInfo {
                descriptor_type: DescriptorType::CombinedImageSampler,
                binding: 2,
                count: 6,
            }
        );
    }

    #[test]
    fn texel_buffers_are_unsupported() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(ReflectedBinding::new(
            "lut",
            0,
            ReflectedDescriptorType::UniformTexelBuffer,
        ));
        assert_eq!(
            ShaderResourceTable::from_stages(&vertex, None),
            Err(ErrorCode::InvalidShaderResourceBinding)
        );
    }

    #[test]
    fn name_reused_at_another_binding_is_rejected() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(ubo("camera", 0));
        let fragment = StageReflection::new(ShaderStage::Fragment).with_binding(ubo("camera", 1));
        assert_eq!(
            ShaderResourceTable::from_stages(&vertex, Some(&fragment)),
            Err(ErrorCode::InvalidShaderResourceBinding)
        );
    }

    #[test]
    fn unknown_name_yields_none() {
        let vertex = StageReflection::new(ShaderStage::Vertex).with_binding(ubo("camera", 0));
        let table = ShaderResourceTable::from_stages(&vertex, None).unwrap();
        assert!(table.get_shader_resource_info("missing").is_none());
    }

    #[test]
    fn vertex_stage_is_mandatory() {
        let fragment = StageReflection::new(ShaderStage::Fragment);
        assert_eq!(
            ShaderResourceTable::from_stages(&fragment, None),
            Err(ErrorCode::InvalidArgs)
        );
    }

    #[test]
    fn layout_bindings_are_sorted() {
        let vertex = StageReflection::new(ShaderStage::Vertex)
            .with_binding(ubo("b", 5))
            .with_binding(ubo("a", 1));
        let table = ShaderResourceTable::from_stages(&vertex, None).unwrap();
        let indices: Vec<u32> = table.layout_bindings().iter().map(|b| b.binding).collect();
        assert_eq!(indices, vec![1, 5]);
    }

    #[test]
    fn garbage_spirv_fails_reflection() {
        let inputs: [&[u32]; 3] = [&[0xdead_beef, 1, 2, 3, 4], &[SPIRV_MAGIC, 0x0001_0000], &[]];
        for code in inputs {
            assert_eq!(
                StageReflection::from_spirv(ShaderStage::Vertex, code),
                Err(ErrorCode::InvalidArgs)
            );
        }
    }

    #[test]
    fn module_without_entry_point_is_rejected() {
        let header = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        assert_eq!(
            StageReflection::from_spirv(ShaderStage::Fragment, &header),
            Err(ErrorCode::InvalidArgs)
        );
    }

    fn instruction(opcode: u32, operands: &[u32]) -> Vec<u32> {
        let mut words = vec![((operands.len() as u32 + 1) << 16) | opcode];
        words.extend_from_slice(operands);
        words
    }

    fn literal(text: &str) -> Vec<u32> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        bytes.resize(bytes.len().div_ceil(4) * 4, 0);
        bytes
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Vertex shader with `uniform Camera { vec4 } camera` at binding 0 and
    /// `sampler2D textures[n]` at binding 1; `None` makes the array runtime-sized.
    fn vertex_module(texture_count: Option<u32>) -> Vec<u32> {
        let with = |head: &[u32], text: &str| [head, &literal(text)[..]].concat();
        let (uniform_constant, uniform) = (0, 2);
        let (binding, descriptor_set, offset, block) = (33, 34, 35, 2);
        let textures_ty = match texture_count {
            Some(_) => instruction(28, &[13, 10, 12]),
            None => instruction(29, &[13, 10]),
        };
        [
            vec![SPIRV_MAGIC, 0x0001_0000, 0, 17, 0],
            instruction(17, &[1]),
            instruction(14, &[0, 1]),
            instruction(15, &with(&[0, 1], "main")),
            instruction(5, &with(&[8], "camera")),
            instruction(5, &with(&[15], "textures")),
            instruction(71, &[6, block]),
            instruction(72, &[6, 0, offset, 0]),
            instruction(71, &[8, descriptor_set, 0]),
            instruction(71, &[8, binding, 0]),
            instruction(71, &[15, descriptor_set, 0]),
            instruction(71, &[15, binding, 1]),
            instruction(19, &[2]),
            instruction(33, &[3, 2]),
            instruction(22, &[4, 32]),
            instruction(23, &[5, 4, 4]),
            instruction(30, &[6, 5]),
            instruction(32, &[7, uniform, 6]),
            instruction(59, &[7, 8, uniform]),
            instruction(25, &[9, 4, 1, 0, 0, 0, 1, 0]),
            instruction(27, &[10, 9]),
            instruction(21, &[11, 32, 0]),
            instruction(43, &[11, 12, texture_count.unwrap_or(1)]),
            textures_ty,
            instruction(32, &[14, uniform_constant, 13]),
            instruction(59, &[14, 15, uniform_constant]),
            instruction(54, &[2, 1, 0, 3]),
            instruction(248, &[16]),
            instruction(253, &[]),
            instruction(56, &[]),
        ]
        .concat()
    }

    #[test]
    fn spirv_bindings_are_reflected() {
        let reflection =
            StageReflection::from_spirv(ShaderStage::Vertex, &vertex_module(Some(4))).unwrap();
        assert_eq!(
            reflection.bindings,
            vec![
                ReflectedBinding::new("camera", 0, ReflectedDescriptorType::UniformBuffer),
                ReflectedBinding::new("textures", 1, ReflectedDescriptorType::CombinedImageSampler)
                    .with_array_dims(&[4]),
            ]
        );

        let table = ShaderResourceTable::from_stages(&reflection, None).unwrap();
        let textures = table.get_shader_resource_info("textures").unwrap();
        assert_eq!(textures.descriptor_type, DescriptorType::CombinedImageSampler);
        assert_eq!(textures.count, 4);
    }

    #[test]
    fn runtime_sized_descriptor_array_is_rejected() {
        assert_eq!(
            StageReflection::from_spirv(ShaderStage::Vertex, &vertex_module(None)),
            Err(ErrorCode::InvalidShaderResourceBinding)
        );
    }
}
