//! Opens the Vulkan device described by `prism.toml` (or the defaults), prints what was picked,
//! then uploads a small buffer through the submission ring and waits for it.
//! Run: cargo run --bin device_info

use anyhow::Context;
use prism_gpu::{BufferCopy, BufferDesc, GpuConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GpuConfig::load();
    let mut device = prism_gpu::create_device_with_config(&config).context("creating Vulkan device")?;

    let info = device.adapter_info();
    println!("adapter:  {} ({})", info.name, if info.discrete { "discrete" } else { "integrated/other" });
    println!("ids:      vendor {:#06x}, device {:#06x}", info.vendor_id, info.device_id);
    let limits = device.limits();
    println!("2D max:   {}", limits.max_texture_dimension_2d);
    println!("layers:   {}", limits.max_texture_array_layers);
    println!("targets:  {}", limits.max_color_attachments);
    println!("aniso:    {}", limits.max_sampler_anisotropy);

    let payload: Vec<u8> = (0..=255u8).collect();
    let staging = device
        .create_buffer(&BufferDesc::staging(payload.len() as u64).with_label("upload"))
        .context("creating staging buffer")?;
    let storage = device
        .create_buffer(&BufferDesc::storage(payload.len() as u64).with_label("storage"))
        .context("creating storage buffer")?;
    device.write_buffer(&staging, 0, &payload)?;

    device.begin_cmd()?;
    device.cmd_copy_buffer(
        &staging,
        &storage,
        BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: payload.len() as u64,
        },
    )?;
    let submission = device.end_cmd()?;
    device.wait_idle()?;
    log::info!("upload finished on submission slot {submission}");

    println!("Prism + Vulkan OK");
    Ok(())
}
