//! Plain value descriptors exchanged between the engine and a backend.
//! Constructing any of these never touches the GPU.

use serde::{Deserialize, Serialize};

/// Unique identifier for a GPU resource.
pub type ResourceId = u64;

bitflags::bitflags! {
    /// Buffer usage flags; combine for buffers used in multiple ways (e.g. Vertex | CopyDst).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
        const UNIFORM_TEXEL = 1 << 6;
        const STORAGE_TEXEL = 1 << 7;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R16Float,
    Rgba16Float,
    R32Float,
    Rgba32Float,
    R32Uint,
    Rgba32Uint,
    R32Sint,
    Rgba32Sint,
    D16Unorm,
    D32Float,
    D24UnormS8Uint,
    D32FloatS8Uint,
}

/// How the components of a format are interpreted; selects the [`ClearValue`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatComponent {
    Float,
    Uint,
    Sint,
    DepthStencil,
}

impl TextureFormat {
    pub fn component(self) -> FormatComponent {
        match self {
            TextureFormat::R32Uint | TextureFormat::Rgba32Uint => FormatComponent::Uint,
            TextureFormat::R32Sint | TextureFormat::Rgba32Sint => FormatComponent::Sint,
            TextureFormat::D16Unorm
            | TextureFormat::D32Float
            | TextureFormat::D24UnormS8Uint
            | TextureFormat::D32FloatS8Uint => FormatComponent::DepthStencil,
            _ => FormatComponent::Float,
        }
    }

    pub fn is_depth(self) -> bool {
        self.component() == FormatComponent::DepthStencil
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::D24UnormS8Uint | TextureFormat::D32FloatS8Uint
        )
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, TextureFormat::Rgba8Srgb | TextureFormat::Bgra8Srgb)
    }

    /// Size of one texel in a tightly packed buffer copy. Depth-stencil formats count the
    /// depth aspect only.
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Float | TextureFormat::D16Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8Srgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8Srgb
            | TextureFormat::R32Float
            | TextureFormat::R32Uint
            | TextureFormat::R32Sint
            | TextureFormat::D32Float
            | TextureFormat::D24UnormS8Uint
            | TextureFormat::D32FloatS8Uint => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float | TextureFormat::Rgba32Uint | TextureFormat::Rgba32Sint => 16,
        }
    }
}

/// Texture dimensionality; decides which device limit bounds the extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureType {
    Texture1D,
    Texture1DArray,
    #[default]
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

impl TextureType {
    pub fn is_cube(self) -> bool {
        matches!(self, TextureType::TextureCube | TextureType::TextureCubeArray)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: Option<&'static str>,
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Only meaningful for [`TextureType::Texture3D`].
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub num_samples: u32,
    pub usage: TextureUsage,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            label: None,
            texture_type: TextureType::Texture2D,
            format: TextureFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            num_samples: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
        }
    }
}

impl TextureDesc {
    /// Single-sampled 2D color target that can also be blitted from.
    pub fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            format,
            width,
            height,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::COPY_SRC,
            ..Default::default()
        }
    }

    pub fn depth_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            format,
            width,
            height,
            usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        }
    }
}

/// Where a buffer's memory lives and which side writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryUsage {
    #[default]
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
    /// Transient attachment memory; only some backends can provide it.
    GpuLazilyAllocated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: Option<&'static str>,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory_usage: MemoryUsage,
}

impl BufferDesc {
    pub fn uniform(size: u64) -> Self {
        Self::new(size, BufferUsage::UNIFORM, MemoryUsage::CpuToGpu)
    }

    pub fn vertex(size: u64) -> Self {
        Self::new(size, BufferUsage::VERTEX | BufferUsage::COPY_DST, MemoryUsage::GpuOnly)
    }

    pub fn index(size: u64) -> Self {
        Self::new(size, BufferUsage::INDEX | BufferUsage::COPY_DST, MemoryUsage::GpuOnly)
    }

    pub fn storage(size: u64) -> Self {
        Self::new(
            size,
            BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
            MemoryUsage::GpuOnly,
        )
    }

    /// Host-written upload source.
    pub fn staging(size: u64) -> Self {
        Self::new(size, BufferUsage::COPY_SRC, MemoryUsage::CpuToGpu)
    }

    /// Host-read download destination.
    pub fn readback(size: u64) -> Self {
        Self::new(size, BufferUsage::COPY_DST, MemoryUsage::GpuToCpu)
    }

    fn new(size: u64, usage: BufferUsage, memory_usage: MemoryUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            memory_usage,
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn is_host_visible(&self) -> bool {
        matches!(self.memory_usage, MemoryUsage::CpuToGpu | MemoryUsage::GpuToCpu)
    }
}

/// Typed view over a texel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferViewDesc {
    pub format: TextureFormat,
    pub offset: u64,
    /// `None` covers the buffer from `offset` to its end.
    pub range: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    #[default]
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentDesc {
    pub format: TextureFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// A multisampled attachment resolved into a single-sampled target at the end of the pass.
    pub resolve: bool,
}

impl ColorAttachmentDesc {
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            resolve: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilAttachmentDesc {
    pub format: TextureFormat,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
}

impl DepthStencilAttachmentDesc {
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
        }
    }
}

/// Single-subpass render pass layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub label: Option<&'static str>,
    pub color_attachments: Vec<ColorAttachmentDesc>,
    pub depth_stencil_attachment: Option<DepthStencilAttachmentDesc>,
    /// Sample count shared by every attachment of the pass.
    pub num_samples: u32,
}

impl Default for RenderPassDesc {
    fn default() -> Self {
        Self {
            label: None,
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            num_samples: 1,
        }
    }
}

impl RenderPassDesc {
    pub fn num_color_attachments(&self) -> usize {
        self.color_attachments.len()
    }

    pub fn has_depth_stencil_attachment(&self) -> bool {
        self.depth_stencil_attachment.is_some()
    }

    pub fn depth_stencil_format(&self) -> Option<TextureFormat> {
        self.depth_stencil_attachment.map(|d| d.format)
    }

    pub fn is_multisampled(&self) -> bool {
        self.num_samples > 1
    }

    pub fn color_format(&self, index: usize) -> Option<TextureFormat> {
        self.color_attachments.get(index).map(|a| a.format)
    }

    pub fn requires_resolve(&self, index: usize) -> bool {
        self.color_attachments
            .get(index)
            .is_some_and(|a| a.resolve)
    }

    pub fn num_resolve_attachments(&self) -> usize {
        self.color_attachments.iter().filter(|a| a.resolve).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    /// Preferred presentable format; also the format of the engine-owned backbuffers.
    pub format: TextureFormat,
    pub vsync: bool,
    /// Preferred number of presentable images, clamped to what the surface allows.
    pub image_count: u32,
}

impl Default for SwapChainDesc {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: TextureFormat::Bgra8Srgb,
            vsync: true,
            image_count: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub label: Option<&'static str>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    /// `Some(n)` enables anisotropic filtering with at most `n` taps.
    pub max_anisotropy: Option<f32>,
    /// Depth-comparison sampler when set.
    pub compare: Option<CompareOp>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1000.0,
            max_anisotropy: None,
            compare: None,
        }
    }
}

/// Clear payload for one attachment; the variant must agree with the attachment's
/// [`FormatComponent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Float([f32; 4]),
    Uint([u32; 4]),
    Int([i32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// The neutral clear for a format: transparent black, or depth 1.0 / stencil 0.
    pub fn default_for(format: TextureFormat) -> Self {
        match format.component() {
            FormatComponent::Float => ClearValue::Float([0.0; 4]),
            FormatComponent::Uint => ClearValue::Uint([0; 4]),
            FormatComponent::Sint => ClearValue::Int([0; 4]),
            FormatComponent::DepthStencil => ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            },
        }
    }

    pub fn matches(&self, format: TextureFormat) -> bool {
        matches!(
            (self, format.component()),
            (ClearValue::Float(_), FormatComponent::Float)
                | (ClearValue::Uint(_), FormatComponent::Uint)
                | (ClearValue::Int(_), FormatComponent::Sint)
                | (ClearValue::DepthStencil { .. }, FormatComponent::DepthStencil)
        )
    }
}

/// Per-dimension maxima queried once at device creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceLimits {
    pub max_texture_dimension_1d: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_dimension_cube: u32,
    pub max_texture_array_layers: u32,
    pub max_color_attachments: u32,
    pub max_sampler_anisotropy: f32,
}

impl Default for DeviceLimits {
    /// Minimums every Vulkan 1.0 implementation guarantees.
    fn default() -> Self {
        Self {
            max_texture_dimension_1d: 4096,
            max_texture_dimension_2d: 4096,
            max_texture_dimension_3d: 256,
            max_texture_dimension_cube: 4096,
            max_texture_array_layers: 256,
            max_color_attachments: 4,
            max_sampler_anisotropy: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub discrete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexType {
    Uint16,
    #[default]
    Uint32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Upload region for a buffer→texture copy into one mip of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTextureCopy {
    pub buffer_offset: u64,
    pub mip_level: u32,
    pub array_layer: u32,
    pub origin: (u32, u32, u32),
    pub extent: (u32, u32, u32),
}
