//! Prism GPU: backend-agnostic device, resource and presentation layer.
//!
//! [`Device`] is the single entry point. It validates descriptors before any allocation,
//! deduplicates pipeline layouts, merges shader reflection per pipeline, and defers the
//! destruction of resources still referenced by in-flight command buffers. A [`Backend`]
//! implementation supplies the native calls; [`vulkan::VulkanBackend`] is the one shipped here.

pub mod command_queue;
pub mod config;
pub mod device;
pub mod error;
pub mod hal;
pub mod layout_cache;
pub mod pipeline_state;
pub mod reflection;
pub mod resource;
pub mod state;
pub mod swapchain;
pub mod types;
pub mod validation;
pub mod window;

#[cfg(feature = "vulkan")]
pub mod vulkan;

#[cfg(test)]
mod mock;

pub use command_queue::{CommandQueue, CommandSubmission, UNATTACHED};
pub use config::{ConfigError, DeviceSettings, GpuConfig, SwapChainSettings};
#[cfg(feature = "vulkan")]
pub use device::{create_device, create_device_with_config};
pub use device::{
    Device, FramebufferColorAttachment, FramebufferDesc, GraphicsPipelineDesc,
};
pub use error::{ErrorCode, GpuResult};
pub use hal::{Backend, PresentMode, SurfaceFormat};
pub use layout_cache::{PipelineLayoutCache, PipelineLayoutItem};
pub use pipeline_state::*;
pub use reflection::{
    DescriptorType, ReflectedBinding, ReflectedDescriptorType, ShaderResourceInfo,
    ShaderResourceTable, ShaderStage, StageReflection,
};
pub use resource::{Buffer, BufferView, Framebuffer, GraphicsPipeline, RenderPass, Sampler, Texture};
pub use swapchain::{SwapChain, SwapChainState};
pub use types::*;
pub use window::{RawHandle, Window, WindowType};
