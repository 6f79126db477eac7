//! Pipeline layouts and graphics pipelines.

use std::ffi::CString;

use ash::vk;

use super::map_vk_result;
use super::sampler::compare_op_to_vk;
use super::texture::sample_count_to_vk;
use super::VulkanBackend;
use crate::error::{ErrorCode, GpuResult};
use crate::hal::GraphicsPipelineInfo;
use crate::pipeline_state::{
    BlendFactor, BlendOp, BlendState, CullMode, DepthStencilState, FrontFace, PolygonMode,
    PrimitiveTopology, ShaderStageDesc, VertexFormat, VertexInputDesc, VertexInputRate,
};
use crate::reflection::{DescriptorType, LayoutBinding};
use crate::types::ShaderStages;

/// Descriptor set 0 and the pipeline layout built around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanPipelineLayout {
    pub set_layout: vk::DescriptorSetLayout,
    pub layout: vk::PipelineLayout,
}

pub(super) fn create_pipeline_layout(
    device: &ash::Device,
    bindings: &[LayoutBinding],
) -> GpuResult<VulkanPipelineLayout> {
    let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
        .iter()
        .map(|b| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                .descriptor_count(b.count)
                .stage_flags(shader_stages_to_vk(b.stages))
        })
        .collect();
    let set_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
    let set_layout =
        unsafe { device.create_descriptor_set_layout(&set_info, None) }.map_err(map_vk_result)?;

    let layout_info =
        vk::PipelineLayoutCreateInfo::default().set_layouts(std::slice::from_ref(&set_layout));
    match unsafe { device.create_pipeline_layout(&layout_info, None) } {
        Ok(layout) => Ok(VulkanPipelineLayout { set_layout, layout }),
        Err(e) => {
            unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
            Err(map_vk_result(e))
        }
    }
}

pub(super) fn destroy_pipeline_layout(device: &ash::Device, layout: VulkanPipelineLayout) {
    unsafe {
        device.destroy_pipeline_layout(layout.layout, None);
        device.destroy_descriptor_set_layout(layout.set_layout, None);
    }
}

pub(super) fn create_graphics_pipeline(
    device: &ash::Device,
    info: &GraphicsPipelineInfo<'_, VulkanBackend>,
) -> GpuResult<vk::Pipeline> {
    let mut stages = vec![(vk::ShaderStageFlags::VERTEX, info.vertex)];
    if let Some(fragment) = info.fragment {
        stages.push((vk::ShaderStageFlags::FRAGMENT, fragment));
    }

    let mut entry_names = Vec::with_capacity(stages.len());
    for (_, stage) in &stages {
        entry_names.push(CString::new(stage.entry_point.as_str()).map_err(|_| ErrorCode::InvalidArgs)?);
    }

    let mut modules = Vec::with_capacity(stages.len());
    for (_, stage) in &stages {
        match create_shader_module(device, stage) {
            Ok(module) => modules.push(module),
            Err(e) => {
                destroy_shader_modules(device, &modules);
                return Err(e);
            }
        }
    }

    let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = stages
        .iter()
        .zip(&modules)
        .zip(&entry_names)
        .map(|(((flags, _), module), name)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(*flags)
                .module(*module)
                .name(name)
        })
        .collect();

    let state = info.state;
    let (binding_descriptions, attribute_descriptions) = vertex_input_descriptions(&state.vertex_input);
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&binding_descriptions)
        .vertex_attribute_descriptions(&attribute_descriptions);
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(state.topology))
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode_to_vk(state.rasterization.polygon_mode))
        .line_width(1.0)
        .cull_mode(cull_mode_to_vk(state.rasterization.cull_mode))
        .front_face(front_face_to_vk(state.rasterization.front_face))
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(sample_count_to_vk(info.render_pass_desc.num_samples));

    let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..info
        .render_pass_desc
        .num_color_attachments())
        .map(|i| blend_attachment(state.blend.get(i).copied().flatten()))
        .collect();
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let depth_stencil = depth_stencil_state(state.depth_stencil.as_ref());

    let dynamic_states = [
        vk::DynamicState::VIEWPORT,
        vk::DynamicState::SCISSOR,
        vk::DynamicState::BLEND_CONSTANTS,
        vk::DynamicState::STENCIL_REFERENCE,
    ];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stage_infos)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blend)
        .depth_stencil_state(&depth_stencil)
        .dynamic_state(&dynamic_state)
        .layout(info.layout.layout)
        .render_pass(info.render_pass)
        .subpass(0);

    let result = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    };
    destroy_shader_modules(device, &modules);

    let pipelines = result.map_err(|(_, e)| map_vk_result(e))?;
    pipelines.into_iter().next().ok_or(ErrorCode::InternalError)
}

fn create_shader_module(device: &ash::Device, stage: &ShaderStageDesc) -> GpuResult<vk::ShaderModule> {
    if stage.code.is_empty() {
        return Err(ErrorCode::InvalidArgs);
    }
    let create_info = vk::ShaderModuleCreateInfo::default().code(&stage.code);
    unsafe { device.create_shader_module(&create_info, None) }.map_err(map_vk_result)
}

fn destroy_shader_modules(device: &ash::Device, modules: &[vk::ShaderModule]) {
    for module in modules {
        unsafe { device.destroy_shader_module(*module, None) };
    }
}

fn vertex_input_descriptions(
    desc: &VertexInputDesc,
) -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let bindings = desc
        .bindings
        .iter()
        .map(|b| {
            vk::VertexInputBindingDescription::default()
                .binding(b.binding)
                .stride(b.stride)
                .input_rate(match b.input_rate {
                    VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
                    VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
                })
        })
        .collect();
    let attributes = desc
        .attributes
        .iter()
        .map(|a| {
            vk::VertexInputAttributeDescription::default()
                .location(a.location)
                .binding(a.binding)
                .format(vertex_format_to_vk(a.format))
                .offset(a.offset)
        })
        .collect();
    (bindings, attributes)
}

fn blend_attachment(blend: Option<BlendState>) -> vk::PipelineColorBlendAttachmentState {
    let attachment =
        vk::PipelineColorBlendAttachmentState::default().color_write_mask(vk::ColorComponentFlags::RGBA);
    match blend {
        None => attachment.blend_enable(false),
        Some(b) => attachment
            .blend_enable(true)
            .src_color_blend_factor(blend_factor_to_vk(b.color.src_factor))
            .dst_color_blend_factor(blend_factor_to_vk(b.color.dst_factor))
            .color_blend_op(blend_op_to_vk(b.color.operation))
            .src_alpha_blend_factor(blend_factor_to_vk(b.alpha.src_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(b.alpha.dst_factor))
            .alpha_blend_op(blend_op_to_vk(b.alpha.operation)),
    }
}

fn depth_stencil_state(state: Option<&DepthStencilState>) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    let Some(ds) = state else {
        return vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .stencil_test_enable(false);
    };
    // Reference comes from dynamic state; the stencil buffer is only compared, never written.
    let stencil = vk::StencilOpState::default()
        .fail_op(vk::StencilOp::KEEP)
        .pass_op(vk::StencilOp::KEEP)
        .depth_fail_op(vk::StencilOp::KEEP)
        .compare_op(compare_op_to_vk(ds.stencil_compare))
        .compare_mask(0xff)
        .write_mask(0);
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(ds.depth_test)
        .depth_write_enable(ds.depth_write)
        .depth_compare_op(compare_op_to_vk(ds.depth_compare))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(ds.stencil_test)
        .front(stencil)
        .back(stencil)
}

pub fn descriptor_type_to_vk(t: DescriptorType) -> vk::DescriptorType {
    match t {
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
    }
}

fn shader_stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

fn vertex_format_to_vk(f: VertexFormat) -> vk::Format {
    match f {
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Uint32 => vk::Format::R32_UINT,
        VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
    }
}

fn topology_to_vk(t: PrimitiveTopology) -> vk::PrimitiveTopology {
    match t {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

fn polygon_mode_to_vk(p: PolygonMode) -> vk::PolygonMode {
    match p {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

fn cull_mode_to_vk(c: CullMode) -> vk::CullModeFlags {
    match c {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

fn front_face_to_vk(f: FrontFace) -> vk::FrontFace {
    match f {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

fn blend_factor_to_vk(f: BlendFactor) -> vk::BlendFactor {
    match f {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::ConstantColor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

fn blend_op_to_vk(o: BlendOp) -> vk::BlendOp {
    match o {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline_state::{VertexAttribute, VertexBufferLayout};
    use crate::types::CompareOp;

    #[test]
    fn vertex_input_keeps_bindings_and_attributes() {
        let desc = VertexInputDesc {
            bindings: vec![VertexBufferLayout {
                binding: 0,
                stride: 20,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: VertexFormat::Float32x3, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: VertexFormat::Float32x2, offset: 12 },
            ],
        };
        let (bindings, attributes) = vertex_input_descriptions(&desc);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 20);
        assert_eq!(attributes[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[1].offset, 12);
    }

    #[test]
    fn missing_blend_state_disables_blending() {
        let off = blend_attachment(None);
        assert_eq!(off.blend_enable, vk::FALSE);
        let on = blend_attachment(Some(BlendState::ALPHA_BLENDING));
        assert_eq!(on.blend_enable, vk::TRUE);
        assert_eq!(on.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
    }

    #[test]
    fn stencil_test_compares_without_writing() {
        let state = DepthStencilState {
            stencil_test: true,
            stencil_compare: CompareOp::Equal,
            ..Default::default()
        };
        let info = depth_stencil_state(Some(&state));
        assert_eq!(info.stencil_test_enable, vk::TRUE);
        assert_eq!(info.front.compare_op, vk::CompareOp::EQUAL);
        assert_eq!(info.front.write_mask, 0);
        assert_eq!(depth_stencil_state(None).depth_test_enable, vk::FALSE);
    }

    #[test]
    fn stage_visibility_maps_to_vk() {
        assert_eq!(
            shader_stages_to_vk(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }
}
