//! Descriptor checks run before any backend allocation.
//!
//! Every function here is pure apart from logging: a failure logs one line per offending
//! field and returns the matching [`ErrorCode`]. A rejected descriptor never reaches the backend.

use crate::error::{ErrorCode, GpuResult};
use crate::pipeline_state::PipelineStateDesc;
use crate::types::{
    BufferDesc, BufferUsage, BufferViewDesc, DeviceLimits, RenderPassDesc, SamplerDesc,
    SwapChainDesc, TextureDesc, TextureType, TextureUsage,
};

const VALID_SAMPLE_COUNTS: [u32; 5] = [1, 2, 4, 8, 16];

fn label(label: Option<&'static str>) -> &'static str {
    label.unwrap_or("<unnamed>")
}

/// Checks extents, mip count, array layering and sample count against `limits`.
/// All violations are logged, not only the first.
pub fn validate_texture_desc(desc: &TextureDesc, limits: &DeviceLimits) -> GpuResult<()> {
    let name = label(desc.label);
    let mut violations: Vec<String> = Vec::new();

    let (max, bounded, dims) = match desc.texture_type {
        TextureType::Texture1D | TextureType::Texture1DArray => (
            limits.max_texture_dimension_1d,
            "max_texture_dimension_1d",
            vec![("width", desc.width)],
        ),
        TextureType::Texture2D | TextureType::Texture2DArray => (
            limits.max_texture_dimension_2d,
            "max_texture_dimension_2d",
            vec![("width", desc.width), ("height", desc.height)],
        ),
        TextureType::TextureCube | TextureType::TextureCubeArray => (
            limits.max_texture_dimension_cube,
            "max_texture_dimension_cube",
            vec![("width", desc.width), ("height", desc.height)],
        ),
        TextureType::Texture3D => (
            limits.max_texture_dimension_3d,
            "max_texture_dimension_3d",
            vec![
                ("width", desc.width),
                ("height", desc.height),
                ("depth", desc.depth),
            ],
        ),
    };
    for (field, value) in dims {
        if value == 0 {
            violations.push(format!("{field} must be non-zero"));
        } else if value > max {
            violations.push(format!("{field} {value} exceeds {bounded} {max}"));
        }
    }

    if desc.mip_levels < 1 {
        violations.push("mip_levels must be at least 1".to_string());
    }

    match desc.texture_type {
        TextureType::TextureCube => {
            if desc.array_layers != 6 {
                violations.push(format!(
                    "cube texture needs exactly 6 array layers, got {}",
                    desc.array_layers
                ));
            }
        }
        TextureType::TextureCubeArray => {
            if desc.array_layers == 0 || desc.array_layers % 6 != 0 {
                violations.push(format!(
                    "cube array layer count {} is not a multiple of 6",
                    desc.array_layers
                ));
            }
            if desc.array_layers > limits.max_texture_array_layers {
                violations.push(format!(
                    "array_layers {} exceeds max_texture_array_layers {}",
                    desc.array_layers, limits.max_texture_array_layers
                ));
            }
        }
        TextureType::Texture1DArray | TextureType::Texture2DArray => {
            if desc.array_layers == 0 || desc.array_layers > limits.max_texture_array_layers {
                violations.push(format!(
                    "array_layers {} outside 1..={}",
                    desc.array_layers, limits.max_texture_array_layers
                ));
            }
        }
        TextureType::Texture1D | TextureType::Texture2D | TextureType::Texture3D => {
            if desc.array_layers != 1 {
                violations.push(format!(
                    "{:?} needs exactly 1 array layer, got {}",
                    desc.texture_type, desc.array_layers
                ));
            }
        }
    }

    if !VALID_SAMPLE_COUNTS.contains(&desc.num_samples) {
        violations.push(format!(
            "num_samples {} is not one of {:?}",
            desc.num_samples, VALID_SAMPLE_COUNTS
        ));
    }

    if violations.is_empty() {
        return Ok(());
    }
    for violation in &violations {
        log::error!("texture '{name}': {violation}");
    }
    Err(ErrorCode::InvalidArgs)
}

pub fn validate_buffer_desc(desc: &BufferDesc) -> GpuResult<()> {
    let name = label(desc.label);
    if desc.size == 0 {
        log::error!("buffer '{name}': size must be non-zero");
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.usage.is_empty() {
        log::error!("buffer '{name}': usage must not be empty");
        return Err(ErrorCode::InvalidArgs);
    }
    Ok(())
}

/// The view must fit inside the buffer, and the buffer must have been created for texel access.
pub fn validate_buffer_view_desc(buffer: &BufferDesc, view: &BufferViewDesc) -> GpuResult<()> {
    let name = label(buffer.label);
    if !buffer
        .usage
        .intersects(BufferUsage::UNIFORM_TEXEL | BufferUsage::STORAGE_TEXEL)
    {
        log::error!("buffer '{name}': view requires UNIFORM_TEXEL or STORAGE_TEXEL usage");
        return Err(ErrorCode::IncompatibleResourceUsage);
    }
    if view.format.is_depth() {
        log::error!("buffer '{name}': view format {:?} is a depth format", view.format);
        return Err(ErrorCode::IncompatibleFormat);
    }
    let range = view.range.unwrap_or(buffer.size.saturating_sub(view.offset));
    if range == 0 || view.offset.checked_add(range).map_or(true, |end| end > buffer.size) {
        log::error!(
            "buffer '{name}': view [{}, +{range}) outside buffer of size {}",
            view.offset,
            buffer.size
        );
        return Err(ErrorCode::InvalidArgs);
    }
    Ok(())
}

pub fn validate_render_pass_desc(desc: &RenderPassDesc, limits: &DeviceLimits) -> GpuResult<()> {
    let name = label(desc.label);
    if desc.color_attachments.is_empty() && desc.depth_stencil_attachment.is_none() {
        log::error!("render pass '{name}': no attachments");
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.num_color_attachments() > limits.max_color_attachments as usize {
        log::error!(
            "render pass '{name}': {} color attachments exceed max_color_attachments {}",
            desc.num_color_attachments(),
            limits.max_color_attachments
        );
        return Err(ErrorCode::InvalidArgs);
    }
    if !VALID_SAMPLE_COUNTS.contains(&desc.num_samples) {
        log::error!("render pass '{name}': num_samples {} is invalid", desc.num_samples);
        return Err(ErrorCode::InvalidArgs);
    }
    for (index, attachment) in desc.color_attachments.iter().enumerate() {
        if attachment.format.is_depth() {
            log::error!(
                "render pass '{name}': color attachment {index} has depth format {:?}",
                attachment.format
            );
            return Err(ErrorCode::IncompatibleFormat);
        }
        if attachment.resolve && !desc.is_multisampled() {
            log::error!(
                "render pass '{name}': color attachment {index} requests a resolve on a single-sampled pass"
            );
            return Err(ErrorCode::InvalidArgs);
        }
    }
    if let Some(depth) = &desc.depth_stencil_attachment {
        if !depth.format.is_depth() {
            log::error!(
                "render pass '{name}': depth-stencil attachment has color format {:?}",
                depth.format
            );
            return Err(ErrorCode::IncompatibleFormat);
        }
    }
    Ok(())
}

pub fn validate_sampler_desc(desc: &SamplerDesc, limits: &DeviceLimits) -> GpuResult<()> {
    let name = label(desc.label);
    if desc.lod_min_clamp > desc.lod_max_clamp {
        log::error!(
            "sampler '{name}': lod_min_clamp {} above lod_max_clamp {}",
            desc.lod_min_clamp,
            desc.lod_max_clamp
        );
        return Err(ErrorCode::InvalidArgs);
    }
    if let Some(anisotropy) = desc.max_anisotropy {
        if !(1.0..=limits.max_sampler_anisotropy).contains(&anisotropy) {
            log::error!(
                "sampler '{name}': max_anisotropy {anisotropy} outside 1.0..={}",
                limits.max_sampler_anisotropy
            );
            return Err(ErrorCode::InvalidArgs);
        }
    }
    Ok(())
}

pub fn validate_swapchain_desc(desc: &SwapChainDesc) -> GpuResult<()> {
    if desc.width == 0 || desc.height == 0 {
        log::error!("swapchain: extent {}x{} is empty", desc.width, desc.height);
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.image_count == 0 {
        log::error!("swapchain: image_count must be non-zero");
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.format.is_depth() {
        log::error!("swapchain: {:?} cannot be presented", desc.format);
        return Err(ErrorCode::FormatNotSupported);
    }
    Ok(())
}

/// One color slot of a framebuffer, seen through the descriptors of its textures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramebufferAttachment<'a> {
    pub texture: Option<&'a TextureDesc>,
    pub resolve: Option<&'a TextureDesc>,
}

/// Framebuffer contents in the shape the validator needs.
#[derive(Debug, Clone, Default)]
pub struct FramebufferLayout<'a> {
    pub color_attachments: Vec<FramebufferAttachment<'a>>,
    pub depth_stencil: Option<&'a TextureDesc>,
    pub width: u32,
    pub height: u32,
}

/// Structural checks of a framebuffer against its render pass: attachment counts,
/// depth-stencil presence, and depth-stencil format and sample count.
pub fn prevalidate_framebuffer_desc(
    render_pass: &RenderPassDesc,
    desc: &FramebufferLayout<'_>,
) -> GpuResult<()> {
    let name = label(render_pass.label);
    if desc.color_attachments.is_empty() && desc.depth_stencil.is_none() {
        log::error!("framebuffer for '{name}': no attachments");
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.width == 0 || desc.height == 0 {
        log::error!("framebuffer for '{name}': extent {}x{} is empty", desc.width, desc.height);
        return Err(ErrorCode::InvalidArgs);
    }
    if desc.color_attachments.len() != render_pass.num_color_attachments() {
        log::error!(
            "framebuffer for '{name}': {} color attachments supplied, render pass declares {}",
            desc.color_attachments.len(),
            render_pass.num_color_attachments()
        );
        return Err(ErrorCode::InvalidArgs);
    }
    match (render_pass.depth_stencil_format(), desc.depth_stencil) {
        (None, None) => {}
        (Some(_), None) => {
            log::error!("framebuffer for '{name}': render pass expects a depth-stencil attachment");
            return Err(ErrorCode::InvalidArgs);
        }
        (None, Some(_)) => {
            log::error!("framebuffer for '{name}': unexpected depth-stencil attachment");
            return Err(ErrorCode::InvalidArgs);
        }
        (Some(expected), Some(depth)) => {
            if depth.format != expected {
                log::error!(
                    "framebuffer for '{name}': depth-stencil format {:?}, render pass declares {:?}",
                    depth.format,
                    expected
                );
                return Err(ErrorCode::IncompatibleFormat);
            }
            if !depth.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
                log::error!(
                    "framebuffer for '{name}': depth-stencil texture lacks DEPTH_STENCIL_ATTACHMENT usage"
                );
                return Err(ErrorCode::IncompatibleResourceUsage);
            }
            if render_pass.is_multisampled() && depth.num_samples != render_pass.num_samples {
                log::error!(
                    "framebuffer for '{name}': depth-stencil has {} samples, render pass uses {}",
                    depth.num_samples,
                    render_pass.num_samples
                );
                return Err(ErrorCode::InvalidArgs);
            }
            validate_attachment_extent("depth-stencil", depth, desc.width, desc.height)?;
        }
    }
    Ok(())
}

/// Checks color slot `index` against the render pass, including its resolve target.
pub fn validate_framebuffer_attachment(
    index: usize,
    render_pass: &RenderPassDesc,
    attachment: &FramebufferAttachment<'_>,
) -> GpuResult<()> {
    let name = label(render_pass.label);
    let Some(texture) = attachment.texture else {
        log::error!("framebuffer for '{name}': color attachment {index} is null");
        return Err(ErrorCode::InvalidArgs);
    };
    if !texture.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        log::error!(
            "framebuffer for '{name}': color attachment {index} ('{}') lacks COLOR_ATTACHMENT usage",
            label(texture.label)
        );
        return Err(ErrorCode::IncompatibleResourceUsage);
    }
    let Some(expected) = render_pass.color_format(index) else {
        log::error!("framebuffer for '{name}': render pass has no color attachment {index}");
        return Err(ErrorCode::InvalidArgs);
    };
    if texture.format != expected {
        log::error!(
            "framebuffer for '{name}': color attachment {index} format {:?}, render pass declares {:?}",
            texture.format,
            expected
        );
        return Err(ErrorCode::IncompatibleFormat);
    }
    if texture.num_samples != render_pass.num_samples {
        log::error!(
            "framebuffer for '{name}': color attachment {index} has {} samples, render pass uses {}",
            texture.num_samples,
            render_pass.num_samples
        );
        return Err(ErrorCode::InvalidArgs);
    }

    match (render_pass.requires_resolve(index), attachment.resolve) {
        (false, None) => {}
        (false, Some(_)) => {
            log::error!(
                "framebuffer for '{name}': color attachment {index} has a resolve target it does not need"
            );
            return Err(ErrorCode::InvalidArgs);
        }
        (true, None) => {
            log::error!("framebuffer for '{name}': color attachment {index} needs a resolve target");
            return Err(ErrorCode::InvalidArgs);
        }
        (true, Some(resolve)) => {
            if resolve.format != expected {
                log::error!(
                    "framebuffer for '{name}': resolve target {index} format {:?}, expected {:?}",
                    resolve.format,
                    expected
                );
                return Err(ErrorCode::IncompatibleFormat);
            }
            if !resolve.usage.contains(TextureUsage::COLOR_ATTACHMENT) {
                log::error!(
                    "framebuffer for '{name}': resolve target {index} lacks COLOR_ATTACHMENT usage"
                );
                return Err(ErrorCode::IncompatibleResourceUsage);
            }
        }
    }
    Ok(())
}

/// Blend entries must not outnumber color attachments, and depth testing needs a
/// depth-stencil attachment.
pub fn validate_pipeline_state(state: &PipelineStateDesc, render_pass: &RenderPassDesc) -> GpuResult<()> {
    let name = label(render_pass.label);
    if state.blend.len() > render_pass.num_color_attachments() {
        log::error!(
            "pipeline for '{name}': {} blend states for {} color attachments",
            state.blend.len(),
            render_pass.num_color_attachments()
        );
        return Err(ErrorCode::InvalidArgs);
    }
    if state.depth_stencil.is_some() && !render_pass.has_depth_stencil_attachment() {
        log::error!("pipeline for '{name}': depth-stencil state on a pass without depth-stencil attachment");
        return Err(ErrorCode::InvalidArgs);
    }
    for (index, layout) in state.vertex_input.bindings.iter().enumerate() {
        if layout.stride == 0 {
            log::error!("pipeline for '{name}': vertex binding {index} has zero stride");
            return Err(ErrorCode::InvalidArgs);
        }
    }
    for attribute in &state.vertex_input.attributes {
        if !state.vertex_input.bindings.iter().any(|b| b.binding == attribute.binding) {
            log::error!(
                "pipeline for '{name}': attribute at location {} reads undeclared binding {}",
                attribute.location,
                attribute.binding
            );
            return Err(ErrorCode::InvalidArgs);
        }
    }
    Ok(())
}

/// An attachment must cover the whole framebuffer.
pub fn validate_attachment_extent(
    what: &str,
    texture: &TextureDesc,
    width: u32,
    height: u32,
) -> GpuResult<()> {
    if texture.width < width || texture.height < height {
        log::error!(
            "{what} '{}' is {}x{}, smaller than framebuffer {width}x{height}",
            label(texture.label),
            texture.width,
            texture.height
        );
        return Err(ErrorCode::InvalidArgs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorAttachmentDesc, DepthStencilAttachmentDesc, TextureFormat};

    fn limits() -> DeviceLimits {
        DeviceLimits {
            max_texture_dimension_1d: 8192,
            max_texture_dimension_2d: 8192,
            max_texture_dimension_3d: 2048,
            max_texture_dimension_cube: 4096,
            max_texture_array_layers: 64,
            max_color_attachments: 8,
            max_sampler_anisotropy: 16.0,
        }
    }

    fn texture(texture_type: TextureType) -> TextureDesc {
        TextureDesc {
            texture_type,
            width: 256,
            height: 256,
            ..Default::default()
        }
    }

    fn color_target(format: TextureFormat) -> TextureDesc {
        TextureDesc::render_target(640, 480, format)
    }

    #[test]
    fn texture_within_limits_is_accepted() {
        for ty in [
            TextureType::Texture1D,
            TextureType::Texture2D,
            TextureType::Texture2DArray,
            TextureType::Texture3D,
        ] {
            assert_eq!(validate_texture_desc(&texture(ty), &limits()), Ok(()), "{ty:?}");
        }
    }

    #[test]
    fn each_violation_is_rejected_independently() {
        let limits = limits();

        let too_wide = TextureDesc { width: 8193, ..texture(TextureType::Texture2D) };
        assert_eq!(validate_texture_desc(&too_wide, &limits), Err(ErrorCode::InvalidArgs));

        let too_deep = TextureDesc { depth: 2049, ..texture(TextureType::Texture3D) };
        assert_eq!(validate_texture_desc(&too_deep, &limits), Err(ErrorCode::InvalidArgs));

        let no_mips = TextureDesc { mip_levels: 0, ..texture(TextureType::Texture2D) };
        assert_eq!(validate_texture_desc(&no_mips, &limits), Err(ErrorCode::InvalidArgs));

        let odd_samples = TextureDesc { num_samples: 3, ..texture(TextureType::Texture2D) };
        assert_eq!(validate_texture_desc(&odd_samples, &limits), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn one_dimensional_textures_ignore_height_limit() {
        let desc = TextureDesc {
            width: 8192,
            height: 1,
            ..texture(TextureType::Texture1D)
        };
        assert_eq!(validate_texture_desc(&desc, &limits()), Ok(()));
    }

    #[test]
    fn cube_requires_exactly_six_layers() {
        let limits = limits();
        for (layers, expected) in [(6, Ok(())), (5, Err(ErrorCode::InvalidArgs)), (7, Err(ErrorCode::InvalidArgs))] {
            let desc = TextureDesc { array_layers: layers, ..texture(TextureType::TextureCube) };
            assert_eq!(validate_texture_desc(&desc, &limits), expected, "layers = {layers}");
        }
    }

    #[test]
    fn non_array_types_require_a_single_layer() {
        let limits = limits();
        for ty in [TextureType::Texture1D, TextureType::Texture2D, TextureType::Texture3D] {
            let layered = TextureDesc { array_layers: 5, ..texture(ty) };
            assert_eq!(validate_texture_desc(&layered, &limits), Err(ErrorCode::InvalidArgs), "{ty:?}");
            let empty = TextureDesc { array_layers: 0, ..texture(ty) };
            assert_eq!(validate_texture_desc(&empty, &limits), Err(ErrorCode::InvalidArgs), "{ty:?}");
        }
        let layered = TextureDesc { array_layers: 5, ..texture(TextureType::Texture2DArray) };
        assert_eq!(validate_texture_desc(&layered, &limits), Ok(()));
    }

    #[test]
    fn cube_array_requires_multiple_of_six() {
        let limits = limits();
        let twelve = TextureDesc { array_layers: 12, ..texture(TextureType::TextureCubeArray) };
        assert_eq!(validate_texture_desc(&twelve, &limits), Ok(()));
        let ten = TextureDesc { array_layers: 10, ..texture(TextureType::TextureCubeArray) };
        assert_eq!(validate_texture_desc(&ten, &limits), Err(ErrorCode::InvalidArgs));
        let too_many = TextureDesc { array_layers: 66, ..texture(TextureType::TextureCubeArray) };
        assert_eq!(validate_texture_desc(&too_many, &limits), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn cube_faces_use_cube_limit() {
        let desc = TextureDesc {
            width: 4097,
            height: 4097,
            array_layers: 6,
            ..texture(TextureType::TextureCube)
        };
        assert_eq!(validate_texture_desc(&desc, &limits()), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn buffer_view_must_fit() {
        let buffer = BufferDesc {
            label: None,
            size: 256,
            usage: BufferUsage::UNIFORM_TEXEL,
            memory_usage: Default::default(),
        };
        let view = BufferViewDesc { format: TextureFormat::R32Float, offset: 128, range: None };
        assert_eq!(validate_buffer_view_desc(&buffer, &view), Ok(()));
        let overflow = BufferViewDesc { range: Some(256), ..view };
        assert_eq!(validate_buffer_view_desc(&buffer, &overflow), Err(ErrorCode::InvalidArgs));
        let plain = BufferDesc { usage: BufferUsage::VERTEX, ..buffer };
        assert_eq!(
            validate_buffer_view_desc(&plain, &view),
            Err(ErrorCode::IncompatibleResourceUsage)
        );
    }

    #[test]
    fn render_pass_rejects_resolve_without_msaa() {
        let mut attachment = ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm);
        attachment.resolve = true;
        let desc = RenderPassDesc {
            color_attachments: vec![attachment],
            ..Default::default()
        };
        assert_eq!(validate_render_pass_desc(&desc, &limits()), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn framebuffer_color_count_must_match() {
        let pass = RenderPassDesc {
            color_attachments: vec![
                ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm),
                ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm),
            ],
            ..Default::default()
        };
        let target = color_target(TextureFormat::Rgba8Unorm);
        let layout = FramebufferLayout {
            color_attachments: vec![FramebufferAttachment { texture: Some(&target), resolve: None }],
            depth_stencil: None,
            width: 640,
            height: 480,
        };
        assert_eq!(prevalidate_framebuffer_desc(&pass, &layout), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn framebuffer_depth_presence_must_match() {
        let pass = RenderPassDesc {
            color_attachments: vec![ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm)],
            depth_stencil_attachment: Some(DepthStencilAttachmentDesc::new(TextureFormat::D32Float)),
            ..Default::default()
        };
        let target = color_target(TextureFormat::Rgba8Unorm);
        let mut layout = FramebufferLayout {
            color_attachments: vec![FramebufferAttachment { texture: Some(&target), resolve: None }],
            depth_stencil: None,
            width: 640,
            height: 480,
        };
        assert_eq!(prevalidate_framebuffer_desc(&pass, &layout), Err(ErrorCode::InvalidArgs));

        let wrong_depth = TextureDesc::depth_target(640, 480, TextureFormat::D16Unorm);
        layout.depth_stencil = Some(&wrong_depth);
        assert_eq!(
            prevalidate_framebuffer_desc(&pass, &layout),
            Err(ErrorCode::IncompatibleFormat)
        );

        let depth = TextureDesc::depth_target(640, 480, TextureFormat::D32Float);
        layout.depth_stencil = Some(&depth);
        assert_eq!(prevalidate_framebuffer_desc(&pass, &layout), Ok(()));
    }

    #[test]
    fn attachment_without_color_usage_is_rejected() {
        let pass = RenderPassDesc {
            color_attachments: vec![ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm)],
            ..Default::default()
        };
        let sampled_only = TextureDesc {
            width: 640,
            height: 480,
            usage: TextureUsage::SAMPLED,
            ..Default::default()
        };
        let attachment = FramebufferAttachment { texture: Some(&sampled_only), resolve: None };
        assert_eq!(
            validate_framebuffer_attachment(0, &pass, &attachment),
            Err(ErrorCode::IncompatibleResourceUsage)
        );
    }

    #[test]
    fn attachment_format_and_null_checks() {
        let pass = RenderPassDesc {
            color_attachments: vec![ColorAttachmentDesc::new(TextureFormat::Rgba16Float)],
            ..Default::default()
        };
        let wrong = color_target(TextureFormat::Rgba8Unorm);
        assert_eq!(
            validate_framebuffer_attachment(0, &pass, &FramebufferAttachment { texture: Some(&wrong), resolve: None }),
            Err(ErrorCode::IncompatibleFormat)
        );
        assert_eq!(
            validate_framebuffer_attachment(0, &pass, &FramebufferAttachment::default()),
            Err(ErrorCode::InvalidArgs)
        );
    }

    #[test]
    fn resolve_target_required_exactly_when_declared() {
        let mut color = ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm);
        color.resolve = true;
        let pass = RenderPassDesc {
            color_attachments: vec![color],
            num_samples: 4,
            ..Default::default()
        };
        let msaa = TextureDesc { num_samples: 4, ..color_target(TextureFormat::Rgba8Unorm) };
        let resolve = color_target(TextureFormat::Rgba8Unorm);

        let missing = FramebufferAttachment { texture: Some(&msaa), resolve: None };
        assert_eq!(validate_framebuffer_attachment(0, &pass, &missing), Err(ErrorCode::InvalidArgs));

        let present = FramebufferAttachment { texture: Some(&msaa), resolve: Some(&resolve) };
        assert_eq!(validate_framebuffer_attachment(0, &pass, &present), Ok(()));

        let single = RenderPassDesc {
            color_attachments: vec![ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm)],
            ..Default::default()
        };
        let plain = color_target(TextureFormat::Rgba8Unorm);
        let unneeded = FramebufferAttachment { texture: Some(&plain), resolve: Some(&resolve) };
        assert_eq!(validate_framebuffer_attachment(0, &single, &unneeded), Err(ErrorCode::InvalidArgs));
    }

    #[test]
    fn sampler_anisotropy_is_bounded() {
        let desc = SamplerDesc { max_anisotropy: Some(32.0), ..Default::default() };
        assert_eq!(validate_sampler_desc(&desc, &limits()), Err(ErrorCode::InvalidArgs));
        let desc = SamplerDesc { max_anisotropy: Some(8.0), ..Default::default() };
        assert_eq!(validate_sampler_desc(&desc, &limits()), Ok(()));
    }

    #[test]
    fn pipeline_state_must_fit_render_pass() {
        use crate::pipeline_state::{BlendState, DepthStencilState, VertexAttribute, VertexFormat};

        let pass = RenderPassDesc {
            color_attachments: vec![ColorAttachmentDesc::new(TextureFormat::Rgba8Unorm)],
            ..Default::default()
        };
        let mut state = PipelineStateDesc {
            blend: vec![Some(BlendState::ALPHA_BLENDING)],
            ..Default::default()
        };
        assert_eq!(validate_pipeline_state(&state, &pass), Ok(()));

        state.blend.push(None);
        assert_eq!(validate_pipeline_state(&state, &pass), Err(ErrorCode::InvalidArgs));
        state.blend.pop();

        state.depth_stencil = Some(DepthStencilState::default());
        assert_eq!(validate_pipeline_state(&state, &pass), Err(ErrorCode::InvalidArgs));
        state.depth_stencil = None;

        state.vertex_input.attributes.push(VertexAttribute {
            location: 0,
            binding: 1,
            format: VertexFormat::Float32x3,
            offset: 0,
        });
        assert_eq!(validate_pipeline_state(&state, &pass), Err(ErrorCode::InvalidArgs));
    }
}
