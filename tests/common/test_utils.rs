use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io::Cursor,
    rc::Rc,
};

use figurine::{
    config::AssetPaths,
    keys::{AbilityKey, ClassKey},
    resources::texture::{ModelSource, Transfer},
};

/// Builds small binary glTF files out of axis aligned boxes.
#[derive(Default)]
pub struct GlbBuilder {
    bin: Vec<u8>,
    views: Vec<String>,
    accessors: Vec<String>,
    meshes: Vec<String>,
    nodes: Vec<String>,
    roots: Vec<usize>,
    images: Vec<String>,
    textures: Vec<String>,
    materials: Vec<String>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.views.push(format!(
            r#"{{"buffer":0,"byteOffset":{},"byteLength":{}}}"#,
            self.bin.len(),
            bytes.len()
        ));
        self.bin.extend_from_slice(bytes);
        self.views.len() - 1
    }

    /// A material whose base colour map is a 2x2 PNG of `rgba`.
    pub fn textured_material(&mut self, name: &str, rgba: [u8; 4]) -> usize {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encoding a png in memory");
        let view = self.push_view(&png);
        self.images.push(format!(
            r#"{{"bufferView":{},"mimeType":"image/png"}}"#,
            view
        ));
        self.textures
            .push(format!(r#"{{"source":{}}}"#, self.images.len() - 1));
        self.materials.push(format!(
            r#"{{"name":"{}","pbrMetallicRoughness":{{"baseColorTexture":{{"index":{}}}}}}}"#,
            name,
            self.textures.len() - 1
        ));
        self.materials.len() - 1
    }

    /// A box from `min` to `max` in its own node. Returns the node index.
    pub fn cuboid(
        &mut self,
        name: &str,
        min: [f32; 3],
        max: [f32; 3],
        material: Option<usize>,
    ) -> usize {
        let mut positions = Vec::new();
        for i in 0..8 {
            let corner = [
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            ];
            positions.extend(corner.iter().flat_map(|c| c.to_le_bytes()));
        }
        const FACES: [[u16; 4]; 6] = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ];
        let indices: Vec<u8> = FACES
            .iter()
            .flat_map(|[a, b, c, d]| [*a, *b, *c, *a, *c, *d])
            .flat_map(|i| i.to_le_bytes())
            .collect();

        let position_view = self.push_view(&positions);
        self.accessors.push(format!(
            r#"{{"bufferView":{},"componentType":5126,"count":8,"type":"VEC3","min":{:?},"max":{:?}}}"#,
            position_view, min, max
        ));
        let position_accessor = self.accessors.len() - 1;
        let index_view = self.push_view(&indices);
        self.accessors.push(format!(
            r#"{{"bufferView":{},"componentType":5123,"count":36,"type":"SCALAR"}}"#,
            index_view
        ));
        let index_accessor = self.accessors.len() - 1;

        let material = material
            .map(|m| format!(r#","material":{}"#, m))
            .unwrap_or_default();
        self.meshes.push(format!(
            r#"{{"name":"{}","primitives":[{{"attributes":{{"POSITION":{}}},"indices":{}{}}}]}}"#,
            name, position_accessor, index_accessor, material
        ));
        self.nodes.push(format!(
            r#"{{"name":"{}","mesh":{}}}"#,
            name,
            self.meshes.len() - 1
        ));
        self.nodes.len() - 1
    }

    /// An empty node holding `children`, moved by `translation`.
    pub fn group(&mut self, name: &str, children: &[usize], translation: [f32; 3]) -> usize {
        self.nodes.push(format!(
            r#"{{"name":"{}","children":{:?},"translation":{:?}}}"#,
            name, children, translation
        ));
        self.nodes.len() - 1
    }

    pub fn root(mut self, node: usize) -> Self {
        self.roots.push(node);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let optional = |key: &str, items: &[String]| {
            if items.is_empty() {
                String::new()
            } else {
                format!(r#","{}":[{}]"#, key, items.join(","))
            }
        };
        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":{:?}}}],"nodes":[{}],"meshes":[{}],"accessors":[{}],"bufferViews":[{}],"buffers":[{{"byteLength":{}}}]{}{}{}}}"#,
            self.roots,
            self.nodes.join(","),
            self.meshes.join(","),
            self.accessors.join(","),
            self.views.join(","),
            self.bin.len(),
            optional("images", &self.images),
            optional("textures", &self.textures),
            optional("materials", &self.materials),
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + self.bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(self.bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&self.bin);
        glb
    }
}

/// A single textured box from `min` to `max`.
pub fn box_model(name: &str, min: [f32; 3], max: [f32; 3]) -> Vec<u8> {
    let mut builder = GlbBuilder::new();
    let material = builder.textured_material(name, [200, 120, 40, 255]);
    let node = builder.cuboid(name, min, max, Some(material));
    builder.root(node).build()
}

/// In-memory model files with scripted failures.
pub struct FakeSource {
    files: HashMap<String, Vec<u8>>,
    fail_once: RefCell<HashSet<String>>,
    /// Every requested path, shared so it can be read after the source moved.
    pub fetched: Rc<RefCell<Vec<String>>>,
    chunk: usize,
    hide_length: bool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            fail_once: RefCell::new(HashSet::new()),
            fetched: Rc::new(RefCell::new(Vec::new())),
            chunk: 256,
            hide_length: false,
        }
    }

    /// Every class and the ability placeholder as boxes of different sizes.
    pub fn with_all_models() -> Self {
        let paths = AssetPaths::default();
        let mut source = Self::new();
        for (i, class) in ClassKey::ALL.into_iter().enumerate() {
            let size = 1.0 + i as f32;
            source = source.with_file(
                &paths.path(class.into()),
                box_model(class.name(), [0.0, 0.0, 0.0], [size, size * 2.0, size]),
            );
        }
        source.with_file(
            &paths.path(AbilityKey::Ability1.into()),
            box_model("stand", [-3.0, 0.0, -3.0], [3.0, 1.0, 3.0]),
        )
    }

    pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    pub fn without_file(mut self, path: &str) -> Self {
        self.files.remove(path);
        self
    }

    /// The next fetch of `path` fails, later ones succeed.
    pub fn failing_once(self, path: &str) -> Self {
        self.fail_once.borrow_mut().insert(path.to_string());
        self
    }

    /// Behaves like a server that sends no content length.
    pub fn with_unknown_length(mut self) -> Self {
        self.hide_length = true;
        self
    }
}

impl ModelSource for FakeSource {
    async fn fetch(&self, path: &str, on_transfer: &dyn Fn(Transfer)) -> anyhow::Result<Vec<u8>> {
        self.fetched.borrow_mut().push(path.to_string());
        if self.fail_once.borrow_mut().remove(path) {
            anyhow::bail!("connection reset while fetching {}", path);
        }
        let data = self
            .files
            .get(path)
            .ok_or_else(|| anyhow::anyhow!("404 Not Found: {}", path))?;
        let total = (!self.hide_length).then_some(data.len() as u64);
        let mut received = 0;
        while received < data.len() {
            received = (received + self.chunk).min(data.len());
            on_transfer(Transfer {
                received: received as u64,
                total,
            });
        }
        Ok(data.clone())
    }
}
