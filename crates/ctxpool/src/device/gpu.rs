use anyhow::{Context, Result};

use crate::coords::{Extent, Viewport};
use crate::paint::Color;

use super::{ClearSurface, ContextBackend, HeadlessInit};

/// Off-screen render target owned by one pooled handle.
///
/// The texture is reallocated on resize; the surface itself (and the handle
/// holding it) keeps its identity.
pub struct OffscreenSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
}

impl OffscreenSurface {
    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }
}

/// Rendering state bound to a single `OffscreenSurface`.
#[derive(Debug, Clone)]
pub struct RenderContext {
    label: String,
    format: wgpu::TextureFormat,
    viewport: Viewport,
}

impl RenderContext {
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Begins a render pass on `surface` with the viewport covering it.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        surface: &OffscreenSurface,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPass<'e> {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label.as_str()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view:           &surface.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes:         None,
            occlusion_query_set:      None,
            multiview_mask:           None,
        });

        rpass.set_viewport(0.0, 0.0, self.viewport.width, self.viewport.height, 0.0, 1.0);
        rpass
    }
}

/// Headless wgpu backend.
///
/// Owns the adapter/device/queue shared by every pooled handle. No window or
/// swapchain is involved; every handle renders into its own texture.
pub struct WgpuBackend {
    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Format of every pooled texture.
    format: wgpu::TextureFormat,

    /// Monotonic id used for debug labels.
    next_id: u64,
}

impl WgpuBackend {
    /// Requests an adapter and device without a compatible surface.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: HeadlessInit) -> Result<Self> {
        let HeadlessInit {
            power_preference,
            force_fallback_adapter,
            format,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ctxpool device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let info = adapter.get_info();
        log::info!("wgpu backend ready: {} ({:?})", info.name, info.backend);

        Ok(Self {
            adapter,
            device,
            queue,
            format,
            next_id: 0,
        })
    }

    /// Blocking variant of [`WgpuBackend::new`] for synchronous hosts.
    pub fn new_blocking(init: HeadlessInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns information about the selected adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the format of pooled surfaces.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Allocates a render-target texture and its view.
    ///
    /// wgpu reports allocation failures through the device error handler,
    /// which panics by default. Both error classes are captured in scopes here
    /// and surfaced as `Err`.
    fn create_target(&self, label: &str, extent: Extent) -> Result<(wgpu::Texture, wgpu::TextureView)> {
        let out_of_memory = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Scopes pop innermost first.
        let invalid = pollster::block_on(validation.pop());
        let oom = pollster::block_on(out_of_memory.pop());

        // A rejected texture is an invalid handle; dropping it is enough.
        if let Some(err) = invalid.or(oom) {
            anyhow::bail!(
                "allocating {label} ({}x{}) failed: {err}",
                extent.width,
                extent.height
            );
        }

        Ok((texture, view))
    }
}

impl ContextBackend for WgpuBackend {
    type Surface = OffscreenSurface;
    type Context = RenderContext;

    fn max_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn create(&mut self, extent: Extent) -> Result<(OffscreenSurface, RenderContext)> {
        let max = self.max_dimension();
        anyhow::ensure!(
            extent.fits(max),
            "surface {}x{} outside device limits (max {max})",
            extent.width,
            extent.height
        );

        let label = format!("ctxpool surface #{}", self.next_id);
        self.next_id += 1;

        let (texture, view) = self.create_target(&label, extent)?;
        log::trace!("created {label} ({}x{})", extent.width, extent.height);

        let context = RenderContext {
            label,
            format: self.format,
            viewport: extent.full_viewport(),
        };

        Ok((OffscreenSurface { texture, view, extent }, context))
    }

    fn resize(&mut self, surface: &mut OffscreenSurface, context: &mut RenderContext, extent: Extent) -> Result<()> {
        let max = self.max_dimension();
        anyhow::ensure!(
            extent.fits(max),
            "surface {}x{} outside device limits (max {max})",
            extent.width,
            extent.height
        );

        // The old texture stays bound until the replacement exists.
        let (texture, view) = self.create_target(&context.label, extent)?;

        let old = std::mem::replace(&mut surface.texture, texture);
        surface.view = view;
        surface.extent = extent;
        old.destroy();

        context.viewport = extent.full_viewport();
        Ok(())
    }

    fn destroy(&mut self, surface: OffscreenSurface, context: RenderContext) -> Result<()> {
        let OffscreenSurface { texture, view, .. } = surface;
        drop(view);
        // Frees VRAM now instead of when the last reference drops.
        texture.destroy();
        log::trace!("destroyed {}", context.label);
        Ok(())
    }
}

impl ClearSurface for WgpuBackend {
    fn clear(&mut self, surface: &mut OffscreenSurface, context: &mut RenderContext, color: Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ctxpool clear encoder"),
            });

        // Pass must end before the encoder is finished.
        {
            let _rpass = context.begin_pass(&mut encoder, surface, wgpu::LoadOp::Clear(color.to_wgpu()));
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
