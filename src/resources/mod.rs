use anyhow::Context;
use base64::Engine;

use crate::{
    data_structures::{
        instance::Instance,
        model::ModelVertex,
        scene_graph::{Geometry, Material, Mesh, Node, Primitive, Side, TextureImage, TextureSlot},
    },
    resources::texture::{ModelSource, Transfer},
};

/**
 * This module contains all logic for loading models from external files.
 */
pub mod texture;

/// Fetches a binary or embedded glTF file and builds its scene graph.
///
/// External buffers and images are resolved relative to `file_name` through
/// the same source. Only `on_transfer` of the main file is reported.
pub async fn load_model_gltf<S: ModelSource>(
    source: &S,
    file_name: &str,
    on_transfer: &dyn Fn(Transfer),
) -> anyhow::Result<Node> {
    let bytes = source.fetch(file_name, on_transfer).await?;
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("parsing {}", file_name))?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| anyhow::anyhow!("{} references a missing GLB blob", file_name))?,
            gltf::buffer::Source::Uri(uri) => load_uri(source, file_name, uri).await?,
        };
        buffer_data.push(data);
    }

    // Load images
    let mut images = Vec::new();
    for image in gltf.images() {
        let label = format!("{}#image{}", file_name, image.index());
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = buffer_data
                    .get(view.buffer().index())
                    .ok_or_else(|| anyhow::anyhow!("{} has a dangling buffer view", label))?;
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or_else(|| anyhow::anyhow!("{} lies outside its buffer", label))?;
                decode_image(bytes, Some(mime_type))
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let bytes = load_uri(source, file_name, uri).await?;
                decode_image(&bytes, mime_type)
            }
        }
        .with_context(|| format!("decoding {}", label))?;
        images.push(TextureImage {
            label,
            image: decoded,
        });
    }

    // Load materials
    let materials: Vec<Material> = gltf
        .materials()
        .map(|material| to_material(&material, &images))
        .collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| anyhow::anyhow!("{} contains no scene", file_name))?;
    let mut roots: Vec<Node> = scene
        .nodes()
        .map(|node| to_node(node, &buffer_data, &materials))
        .collect();

    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        let mut root = Node::new(model_name(file_name));
        root.children = roots;
        root
    };
    Ok(root)
}

fn model_name(file_name: &str) -> &str {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    base.split('.').next().unwrap_or(base)
}

/// Reads an embedded `data:` URI or a file next to `file_name`.
async fn load_uri<S: ModelSource>(
    source: &S,
    file_name: &str,
    uri: &str,
) -> anyhow::Result<Vec<u8>> {
    if let Some(data) = uri.strip_prefix("data:") {
        let (_, encoded) = data
            .split_once(";base64,")
            .ok_or_else(|| anyhow::anyhow!("unsupported data URI in {}", file_name))?;
        return Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?);
    }
    let path = match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, uri),
        None => uri.to_string(),
    };
    source.fetch(&path, &|_| {}).await
}

fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<image::RgbaImage> {
    let image = match mime_type.and_then(image::ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(image.to_rgba8())
}

fn to_material(material: &gltf::Material, images: &[TextureImage]) -> Material {
    let mut result = Material::new(material.name().unwrap_or("material"));
    let pbr = material.pbr_metallic_roughness();
    result.base_color = pbr.base_color_factor();
    if material.double_sided() {
        result.side = Side::Double;
    }

    let lookup = |texture: gltf::Texture| images.get(texture.source().index()).cloned();
    let slots = [
        (TextureSlot::BaseColor, pbr.base_color_texture().map(|t| t.texture())),
        (TextureSlot::Normal, material.normal_texture().map(|t| t.texture())),
        (TextureSlot::Occlusion, material.occlusion_texture().map(|t| t.texture())),
        (TextureSlot::Emissive, material.emissive_texture().map(|t| t.texture())),
        (
            TextureSlot::MetallicRoughness,
            pbr.metallic_roughness_texture().map(|t| t.texture()),
        ),
    ];
    for (slot, texture) in slots {
        if let Some(image) = texture.and_then(lookup) {
            result.set_texture(slot, image);
        }
    }
    result
}

fn to_node(node: gltf::scene::Node, buffers: &[Vec<u8>], materials: &[Material]) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = Instance {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };
    let name = node.name().unwrap_or("node");

    let mut result = match node.mesh() {
        Some(mesh) => {
            let primitives = mesh
                .primitives()
                .map(|primitive| to_primitive(&primitive, buffers, materials))
                .collect();
            Node::with_mesh(name, Mesh::new(mesh.name().unwrap_or(name), primitives))
        }
        None => Node::new(name),
    };
    result.transform = transform;
    result.children = node
        .children()
        .map(|child| to_node(child, buffers, materials))
        .collect();
    result
}

fn to_primitive(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    materials: &[Material],
) -> Primitive {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .map(|positions| {
            positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect()
        })
        .unwrap_or_default();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(v, normal)| v.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(v, tex_coords)| v.tex_coords = tex_coords);
    }
    if let Some(tangents) = reader.read_tangents() {
        vertices.iter_mut().zip(tangents).for_each(|(v, tangent)| {
            // The fourth component gives the handedness of the bitangent
            let tangent: cgmath::Vector4<f32> = tangent.into();
            let normal: cgmath::Vector3<f32> = v.normal.into();
            v.tangent = tangent.truncate().into();
            v.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
        });
    }

    let indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect())
        .unwrap_or_default();

    let material = primitive
        .material()
        .index()
        .and_then(|index| materials.get(index))
        .cloned()
        .unwrap_or_default();

    Primitive {
        geometry: Geometry { vertices, indices },
        material,
    }
}
