//! Vertex layout and GPU copies of the scene graph.
//!
//! [`GpuModel`] is the uploaded form of a [`DisplayGroup`]: one vertex and
//! index buffer per primitive, one bind group per material. The renderer
//! builds a new one whenever the group changes and destroys the old one.

use wgpu::util::DeviceExt;

use crate::data_structures::{
    instance::{Instance, InstanceRaw},
    scene_graph::{DisplayGroup, Material, Side, TextureSlot},
    texture::Texture,
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Per material shader constants.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    /// x: 1 if a normal map is bound.
    flags: [f32; 4],
}

pub struct GpuMaterial {
    pub name: String,
    pub diffuse: Texture,
    pub normal: Texture,
    uniform: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material: &Material,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let diffuse = match material.texture(TextureSlot::BaseColor) {
            Some(t) => Texture::from_rgba(device, queue, &t.image, &t.label, false),
            None => Texture::create_solid(device, queue, [255; 4], "default diffuse"),
        };
        let normal = match material.texture(TextureSlot::Normal) {
            Some(t) => Texture::from_rgba(device, queue, &t.image, &t.label, true),
            None => Texture::create_default_normal_map(1, 1, device, queue),
        };
        let has_normal_map = material.texture(TextureSlot::Normal).is_some();
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", material.name)),
            contents: bytemuck::cast_slice(&[MaterialUniform {
                base_color: material.base_color,
                flags: [if has_normal_map { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&normal.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform.as_entire_binding(),
                },
            ],
            label: Some(&material.name),
        });

        Self {
            name: material.name.clone(),
            diffuse,
            normal,
            uniform,
            bind_group,
        }
    }

    pub fn destroy(&self) {
        self.diffuse.texture.destroy();
        self.normal.texture.destroy();
        self.uniform.destroy();
    }
}

pub struct GpuPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
    pub double_sided: bool,
    /// Transform relative to the display group.
    pub local: Instance,
}

/// Everything the renderer needs to draw the display group.
pub struct GpuModel {
    pub primitives: Vec<GpuPrimitive>,
    pub materials: Vec<GpuMaterial>,
    pub instance_buffer: wgpu::Buffer,
    pub revision: u64,
}

impl GpuModel {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        group: &DisplayGroup,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let mut primitives = Vec::new();
        let mut materials = Vec::new();
        for child in group.children() {
            for (local, primitive) in child.primitives(&Instance::default()) {
                let geometry = &primitive.geometry;
                if geometry.vertices.is_empty() {
                    continue;
                }
                // Non-indexed primitives are drawn as a plain triangle list.
                let indices: Vec<u32> = if geometry.indices.is_empty() {
                    (0..geometry.vertices.len() as u32).collect()
                } else {
                    geometry.indices.clone()
                };
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", child.name)),
                    contents: bytemuck::cast_slice(&geometry.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", child.name)),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                materials.push(GpuMaterial::new(device, queue, &primitive.material, layout));
                primitives.push(GpuPrimitive {
                    vertex_buffer,
                    index_buffer,
                    num_elements: indices.len() as u32,
                    material: materials.len() - 1,
                    double_sided: primitive.material.side == Side::Double,
                    local,
                });
            }
        }

        let instance_data = instance_data(group, &primitives);
        // At least one instance so the buffer is never empty.
        let contents: Vec<InstanceRaw> = if instance_data.is_empty() {
            vec![Instance::default().to_raw()]
        } else {
            instance_data
        };
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Display Group Instance Buffer"),
            contents: bytemuck::cast_slice(&contents),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            primitives,
            materials,
            instance_buffer,
            revision: group.revision(),
        }
    }

    /// Writes this frame's world transforms, one instance per primitive.
    pub fn update_transforms(&self, queue: &wgpu::Queue, group: &DisplayGroup) {
        let data = instance_data(group, &self.primitives);
        if !data.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&data));
        }
    }

    pub fn destroy(&self) {
        for primitive in &self.primitives {
            primitive.vertex_buffer.destroy();
            primitive.index_buffer.destroy();
        }
        self.materials.iter().for_each(GpuMaterial::destroy);
        self.instance_buffer.destroy();
    }
}

fn instance_data(group: &DisplayGroup, primitives: &[GpuPrimitive]) -> Vec<InstanceRaw> {
    let root = group.transform();
    primitives
        .iter()
        .map(|p| (&root * &p.local).to_raw())
        .collect()
}
