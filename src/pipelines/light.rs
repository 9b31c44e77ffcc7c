use wgpu::util::DeviceExt;

use crate::config::{LightingConfig, linear_rgb};

/// Ambient light plus two warm key lights.
///
/// Colours are linear and premultiplied by their intensity; every field is
/// a `vec4` so the layout needs no padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub ambient: [f32; 4],
    pub key_colour: [f32; 4],
    pub key_positions: [[f32; 4]; 2],
}

fn scaled(hex: u32, intensity: f32) -> [f32; 4] {
    let [r, g, b] = linear_rgb(hex);
    [r * intensity, g * intensity, b * intensity, 1.0]
}

impl LightUniform {
    pub fn new(config: &LightingConfig) -> Self {
        let [left, right] = config.key_positions;
        Self {
            ambient: scaled(config.ambient_colour, config.ambient_intensity),
            key_colour: scaled(config.key_colour, config.key_intensity),
            key_positions: [
                [left[0], left[1], left[2], 0.0],
                [right[0], right[1], right[2], 0.0],
            ],
        }
    }

    pub fn set_ambient(&mut self, colour: u32, intensity: f32) {
        self.ambient = scaled(colour, intensity);
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_scale_colours_by_intensity() {
        let mut uniform = LightUniform::new(&LightingConfig::default());
        assert_eq!(uniform.key_positions[0], [-8.0, 5.0, 4.0, 0.0]);
        uniform.set_ambient(0xffffff, 0.5);
        assert_eq!(uniform.ambient, [0.5, 0.5, 0.5, 1.0]);
    }
}
