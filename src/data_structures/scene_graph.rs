//! Scene graph of loaded models.
//!
//! A loaded model is a tree of [`Node`]s. The tree is plain owned data: a
//! `clone()` is a deep copy whose transforms, materials and geometry can be
//! changed without affecting the original. GPU copies are made by the
//! renderer from whatever tree is currently displayed.

use std::collections::BTreeMap;

use cgmath::{Rotation3, Vector3};
use log::warn;

use crate::data_structures::{instance::Instance, model::ModelVertex};

/// Material texture slots, modelled after the usual PBR maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    Occlusion,
    Emissive,
    MetallicRoughness,
    Environment,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 6] = [
        TextureSlot::BaseColor,
        TextureSlot::Normal,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
        TextureSlot::MetallicRoughness,
        TextureSlot::Environment,
    ];
}

/// A decoded texture image.
#[derive(Clone, Debug)]
pub struct TextureImage {
    pub label: String,
    pub image: image::RgbaImage,
}

/// Which faces are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub side: Side,
    textures: BTreeMap<TextureSlot, TextureImage>,
    released: bool,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base_color: [1.0; 4],
            side: Side::Front,
            textures: BTreeMap::new(),
            released: false,
        }
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureImage> {
        self.textures.get(&slot)
    }

    pub fn set_texture(&mut self, slot: TextureSlot, texture: TextureImage) {
        self.textures.insert(slot, texture);
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn release(&mut self, report: &mut DisposeReport) {
        for slot in TextureSlot::ALL {
            if self.textures.remove(&slot).is_some() {
                report.textures += 1;
            }
        }
        if !self.released {
            self.released = true;
            report.materials += 1;
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    /// Frees the vertex and index storage. Returns false if there was nothing to free.
    fn release(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.vertices = Vec::new();
        self.indices = Vec::new();
        true
    }
}

/// A drawable piece of a mesh with its own material.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(name: &str, primitives: Vec<Primitive>) -> Self {
        Self {
            name: name.to_string(),
            primitives,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Instance,
    pub mesh: Option<Mesh>,
    pub children: Vec<Node>,
}

/// What [`Node::dispose`] released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub geometries: usize,
    pub textures: usize,
    pub materials: usize,
}

impl std::ops::AddAssign for DisposeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.geometries += rhs.geometries;
        self.textures += rhs.textures;
        self.materials += rhs.materials;
    }
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Instance::default(),
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn with_mesh(name: &str, mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::new(name)
        }
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Visits every node depth-first together with its transform relative to
    /// the space `parent` describes.
    pub fn traverse<'a>(&'a self, parent: &Instance, f: &mut dyn FnMut(&'a Node, &Instance)) {
        let world = parent * &self.transform;
        f(self, &world);
        for child in &self.children {
            child.traverse(&world, f);
        }
    }

    pub fn traverse_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&Instance::default(), &mut |node, _| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }

    /// All primitives with their transforms relative to `parent`.
    pub fn primitives<'a>(&'a self, parent: &Instance) -> Vec<(Instance, &'a Primitive)> {
        let mut primitives = Vec::new();
        self.traverse(parent, &mut |node, world| {
            if let Some(mesh) = &node.mesh {
                primitives.extend(mesh.primitives.iter().map(|p| (*world, p)));
            }
        });
        primitives
    }

    /// Axis aligned bounds of all vertices, in the space of this node's parent.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        self.traverse(&Instance::default(), &mut |node, world| {
            let Some(mesh) = &node.mesh else {
                return;
            };
            for primitive in &mesh.primitives {
                for vertex in &primitive.geometry.vertices {
                    let point = world.transform_point(vertex.position.into());
                    match &mut bounds {
                        Some(b) => b.extend(point),
                        None => bounds = Some(Aabb::new(point, point)),
                    }
                }
            }
        });
        bounds
    }

    /// Centres the model on the origin, scales it so its largest dimension
    /// is `target_size` and prepares it for display: every mesh casts and
    /// receives shadows and every material is double sided.
    pub fn normalize(&mut self, target_size: f32) {
        match self.bounding_box() {
            Some(bounds) => {
                let center = bounds.center();
                let max_dim = bounds.max_dimension();
                if max_dim > f32::EPSILON && max_dim.is_finite() {
                    let factor = target_size / max_dim;
                    self.transform.scale *= factor;
                    self.transform.position = (self.transform.position - center) * factor;
                } else {
                    warn!("Model {} has a degenerate bounding box, skipping scale.", self.name);
                    self.transform.position -= center;
                }
            }
            None => warn!("Model {} has no vertices to normalize.", self.name),
        }

        self.traverse_mut(&mut |node| {
            if let Some(mesh) = &mut node.mesh {
                mesh.cast_shadow = true;
                mesh.receive_shadow = true;
                mesh.primitives
                    .iter_mut()
                    .for_each(|p| p.material.side = Side::Double);
            }
        });
    }

    /// Releases geometry, every texture slot and every material in the tree.
    ///
    /// Already released parts are skipped, so disposing twice is harmless.
    pub fn dispose(&mut self) -> DisposeReport {
        let mut report = DisposeReport::default();
        self.traverse_mut(&mut |node| {
            if let Some(mesh) = &mut node.mesh {
                for primitive in &mut mesh.primitives {
                    if primitive.geometry.release() {
                        report.geometries += 1;
                    }
                    primitive.material.release(&mut report);
                }
            }
        });
        report
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    pub fn extend(&mut self, point: Vector3<f32>) {
        self.min = Vector3::new(
            self.min.x.min(point.x),
            self.min.y.min(point.y),
            self.min.z.min(point.z),
        );
        self.max = Vector3::new(
            self.max.x.max(point.x),
            self.max.y.max(point.y),
            self.max.z.max(point.z),
        );
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }
}

/// The parent of the currently shown character and accessory.
///
/// Only the controller rotates it. `revision` changes whenever the children
/// change so the renderer knows when to upload again.
#[derive(Debug, Default)]
pub struct DisplayGroup {
    children: Vec<Node>,
    pitch: f32,
    yaw: f32,
    revision: u64,
}

impl DisplayGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.children.clear();
        self.revision += 1;
    }

    pub fn add(&mut self, child: Node) {
        self.children.push(child);
        self.revision += 1;
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_rotation(&mut self, pitch: f32, yaw: f32) {
        self.pitch = pitch;
        self.yaw = yaw;
    }

    /// `(pitch, yaw)` in radians.
    pub fn rotation(&self) -> (f32, f32) {
        (self.pitch, self.yaw)
    }

    /// Pitch about X applied after yaw about Y.
    pub fn transform(&self) -> Instance {
        Instance {
            rotation: cgmath::Quaternion::from_angle_x(cgmath::Rad(self.pitch))
                * cgmath::Quaternion::from_angle_y(cgmath::Rad(self.yaw)),
            ..Instance::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(min: [f32; 3], max: [f32; 3]) -> Node {
        let vertex = |position| ModelVertex {
            position,
            ..Default::default()
        };
        let geometry = Geometry {
            vertices: vec![vertex(min), vertex(max)],
            indices: vec![0, 1, 0],
        };
        let mut material = Material::new("quad");
        material.set_texture(
            TextureSlot::BaseColor,
            TextureImage {
                label: "white".to_string(),
                image: image::RgbaImage::new(1, 1),
            },
        );
        Node::with_mesh(
            "quad",
            Mesh::new(
                "quad",
                vec![Primitive {
                    geometry,
                    material,
                }],
            ),
        )
    }

    #[test]
    fn should_center_and_scale_to_target_size() {
        let mut node = quad([2.0, 2.0, 2.0], [6.0, 4.0, 3.0]);
        node.transform.position = Vector3::new(1.0, 0.0, 0.0);
        node.normalize(2.0);

        let bounds = node.bounding_box().unwrap();
        assert!((bounds.max_dimension() - 2.0).abs() < 1e-5);
        assert!(bounds.center().x.abs() < 1e-5);
        assert!(bounds.center().y.abs() < 1e-5);
        assert!(bounds.center().z.abs() < 1e-5);

        let mesh = node.mesh.as_ref().unwrap();
        assert!(mesh.cast_shadow && mesh.receive_shadow);
        assert_eq!(mesh.primitives[0].material.side, Side::Double);
    }

    #[test]
    fn should_not_scale_degenerate_models() {
        let mut node = quad([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]);
        node.normalize(2.0);
        assert_eq!(node.transform.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(node.bounding_box().unwrap().center(), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn should_dispose_once() {
        let mut node = quad([0.0; 3], [1.0; 3]);
        node.add_child(quad([0.0; 3], [1.0; 3]));
        let first = node.dispose();
        assert_eq!(
            first,
            DisposeReport {
                geometries: 2,
                textures: 2,
                materials: 2
            }
        );
        assert_eq!(node.dispose(), DisposeReport::default());
        assert!(node.bounding_box().is_none());
        let material = &node.mesh.as_ref().unwrap().primitives[0].material;
        assert!(material.is_released());
        assert_eq!(material.texture_count(), 0);
    }

    #[test]
    fn should_bump_revision_on_change() {
        let mut group = DisplayGroup::new();
        let before = group.revision();
        group.clear();
        group.add(Node::new("a"));
        assert!(group.revision() > before);
        assert_eq!(group.children().len(), 1);
    }
}
