//! Render pass and framebuffer creation.
//!
//! Attachment order is color attachments, then the depth-stencil attachment, then one resolve
//! target per resolving color attachment. Clear values supplied as colors followed by depth
//! therefore line up with attachment indices directly.

use ash::vk;

use super::texture::{sample_count_to_vk, texture_format_to_vk};
use super::{map_vk_result, VulkanBackend};
use crate::error::GpuResult;
use crate::hal::FramebufferTargets;
use crate::types::{LoadOp, RenderPassDesc, StoreOp};

pub(super) fn create_render_pass(device: &ash::Device, desc: &RenderPassDesc) -> GpuResult<vk::RenderPass> {
    let samples = sample_count_to_vk(desc.num_samples);
    let mut attachments = Vec::new();
    let mut color_refs = Vec::with_capacity(desc.color_attachments.len());

    for (i, att) in desc.color_attachments.iter().enumerate() {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(texture_format_to_vk(att.format))
                .samples(samples)
                .load_op(load_op_to_vk(att.load_op))
                .store_op(store_op_to_vk(att.store_op))
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout(att.load_op, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        );
        color_refs.push(
            vk::AttachmentReference::default()
                .attachment(i as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        );
    }

    let depth_ref = desc.depth_stencil_attachment.as_ref().map(|ds| {
        let index = attachments.len() as u32;
        attachments.push(
            vk::AttachmentDescription::default()
                .format(texture_format_to_vk(ds.format))
                .samples(samples)
                .load_op(load_op_to_vk(ds.depth_load_op))
                .store_op(store_op_to_vk(ds.depth_store_op))
                .stencil_load_op(load_op_to_vk(ds.stencil_load_op))
                .stencil_store_op(store_op_to_vk(ds.stencil_store_op))
                .initial_layout(initial_layout(
                    ds.depth_load_op,
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ))
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        );
        vk::AttachmentReference::default()
            .attachment(index)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    });

    // pResolveAttachments must cover every color slot; non-resolving slots are unused.
    let mut resolve_refs = Vec::new();
    if desc.num_resolve_attachments() > 0 {
        for att in &desc.color_attachments {
            if att.resolve {
                let index = attachments.len() as u32;
                attachments.push(
                    vk::AttachmentDescription::default()
                        .format(texture_format_to_vk(att.format))
                        .samples(vk::SampleCountFlags::TYPE_1)
                        .load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .store_op(vk::AttachmentStoreOp::STORE)
                        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                        .initial_layout(vk::ImageLayout::UNDEFINED)
                        .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                );
                resolve_refs.push(
                    vk::AttachmentReference::default()
                        .attachment(index)
                        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                );
            } else {
                resolve_refs.push(
                    vk::AttachmentReference::default()
                        .attachment(vk::ATTACHMENT_UNUSED)
                        .layout(vk::ImageLayout::UNDEFINED),
                );
            }
        }
    }

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if !resolve_refs.is_empty() {
        subpass = subpass.resolve_attachments(&resolve_refs);
    }
    if let Some(ref d) = depth_ref {
        subpass = subpass.depth_stencil_attachment(d);
    }

    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages | vk::PipelineStageFlags::TRANSFER)
        .dst_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    unsafe { device.create_render_pass(&create_info, None) }.map_err(map_vk_result)
}

pub(super) fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    targets: &FramebufferTargets<'_, VulkanBackend>,
) -> GpuResult<vk::Framebuffer> {
    let views: Vec<vk::ImageView> = targets
        .color
        .iter()
        .map(|t| t.view)
        .chain(targets.depth_stencil.map(|t| t.view))
        .chain(targets.resolve.iter().map(|t| t.view))
        .collect();

    let create_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(&views)
        .width(targets.extent.width)
        .height(targets.extent.height)
        .layers(1);
    unsafe { device.create_framebuffer(&create_info, None) }.map_err(map_vk_result)
}

/// Loaded attachments keep their contents; everything else may start undefined.
fn initial_layout(load_op: LoadOp, loaded: vk::ImageLayout) -> vk::ImageLayout {
    match load_op {
        LoadOp::Load => loaded,
        LoadOp::Clear | LoadOp::DontCare => vk::ImageLayout::UNDEFINED,
    }
}

fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}
