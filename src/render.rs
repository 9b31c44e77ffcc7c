//! Per-frame drawing of the display group.
//!
//! The GPU copy of the group is rebuilt whenever its revision changes; the
//! previous copy is destroyed right away instead of waiting for the drop.
//! Between rebuilds only the instance transforms are rewritten.

use crate::{
    context::{Background, Context},
    data_structures::{instance::InstanceRaw, model::GpuModel, scene_graph::DisplayGroup},
};

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Presented,
    /// The surface was not ready; try again next frame.
    Skipped,
}

/// Brings the GPU copy of `group` up to date.
pub fn sync_model(ctx: &mut Context, group: &DisplayGroup) {
    let stale = ctx
        .model
        .as_ref()
        .is_none_or(|model| model.revision != group.revision());
    if stale {
        if let Some(old) = ctx.model.take() {
            old.destroy();
        }
        ctx.model = Some(GpuModel::upload(
            &ctx.device,
            &ctx.queue,
            group,
            &ctx.pipelines.material_layout,
        ));
    } else if let Some(model) = &ctx.model {
        model.update_transforms(&ctx.queue, group);
    }
}

pub fn render(ctx: &mut Context, group: &DisplayGroup) -> Frame {
    sync_model(ctx, group);

    let output = match ctx.surface.get_current_texture() {
        wgpu::CurrentSurfaceTexture::Success(texture) => texture,
        wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
            // Drawn anyway; the surface is reconfigured after presenting.
            draw(ctx, &texture);
            texture.present();
            let (width, height) = (ctx.config.width, ctx.config.height);
            ctx.reconfigure(width, height);
            return Frame::Presented;
        }
        wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
            return Frame::Skipped;
        }
        wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
            let size = ctx.window.inner_size();
            ctx.reconfigure(size.width, size.height);
            return Frame::Skipped;
        }
        wgpu::CurrentSurfaceTexture::Validation => {
            log::error!("Unable to acquire the next frame.");
            return Frame::Skipped;
        }
    };
    draw(ctx, &output);
    output.present();
    Frame::Presented
}

fn draw(ctx: &Context, output: &wgpu::SurfaceTexture) {
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let clear = match &ctx.background {
        Background::Colour(colour) => *colour,
        Background::Image { .. } => wgpu::Color::BLACK,
    };

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if let Background::Image { bind_group, .. } = &ctx.background {
            render_pass.set_pipeline(&ctx.pipelines.background);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        if let Some(model) = &ctx.model {
            render_pass.set_bind_group(1, &ctx.camera.bind_group, &[]);
            render_pass.set_bind_group(2, &ctx.light.bind_group, &[]);
            let stride = std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress;
            for (index, primitive) in model.primitives.iter().enumerate() {
                let pipeline = if primitive.double_sided {
                    &ctx.pipelines.double_sided
                } else {
                    &ctx.pipelines.single_sided
                };
                // WebGL2 has no base instance, so each draw binds its own slice
                let offset = index as wgpu::BufferAddress * stride;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &model.materials[primitive.material].bind_group, &[]);
                render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, model.instance_buffer.slice(offset..offset + stride));
                render_pass.set_index_buffer(
                    primitive.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..primitive.num_elements, 0, 0..1);
            }
        }
    }

    ctx.queue.submit(std::iter::once(encoder.finish()));
}
