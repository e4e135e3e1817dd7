//! PMX binary reader.
//!
//! The file is a header followed by eleven counted sections in a fixed
//! order. String fields are length-prefixed in the encoding the header
//! declares, and cross-references use the per-table index widths from the
//! globals. 2.0 files end before the soft-body section; a clean end of
//! stream at any section boundary simply leaves the remaining sections
//! empty.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use glam::{Quat, Vec3, Vec4};

use crate::bone::{AdditionalTransform, Bone, BoneFlags, Ik, IkLink, TailPosition};
use crate::error::{PmxError, Result};
use crate::types::{
    BoneOffset, BoneWeights, DisplayItem, DisplayNode, Globals, ImpulseOffset, IndexSize, Joint,
    Material, MaterialOffset, ModelInfo, Morph, MorphOffsets, MorphRef, RigidBody, SoftBody,
    SoftBodyAnchor, TextEncoding, ToonTexture, UvOffset, Vertex, VertexOffset,
};

/// The 4-byte magic every PMX file starts with.
pub const MAGIC: [u8; 4] = *b"PMX ";

/// An in-memory PMX model.
#[derive(Clone, Debug)]
pub struct Model {
    pub version: f32,
    pub globals: Globals,
    pub info: ModelInfo,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[i32; 3]>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub display_nodes: Vec<DisplayNode>,
    pub rigid_bodies: Vec<RigidBody>,
    pub joints: Vec<Joint>,
    pub soft_bodies: Vec<SoftBody>,
}

impl Model {
    /// Reads a model from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }

    /// Reads a model from any byte stream.
    pub fn read<R: Read>(input: &mut R) -> Result<Self> {
        read_model(input)
    }

    /// Maps bone names to their indices. Later duplicates win, matching how
    /// the host application resolves names.
    pub fn bone_index_by_name(&self) -> HashMap<&str, usize> {
        self.bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.as_str(), i))
            .collect()
    }
}

struct Parser<'a, R: Read> {
    input: &'a mut R,
    globals: Globals,
}

/// Reads a whole model from `input`.
pub fn read_model<R: Read>(input: &mut R) -> Result<Model> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(PmxError::InvalidMagic { found: magic });
    }
    let version = input.read_f32::<LittleEndian>()?;
    let tenths = (version * 10.0).round() as i32;
    if tenths != 20 && tenths != 21 {
        return Err(PmxError::UnsupportedVersion { version });
    }

    let global_count = input.read_u8()?;
    if global_count < 8 {
        return Err(PmxError::InvalidHeader {
            reason: format!("expected 8 globals, header declares {global_count}"),
        });
    }
    let mut global_bytes = vec![0u8; global_count as usize];
    input.read_exact(&mut global_bytes)?;
    let globals = Globals {
        encoding: TextEncoding::from_byte(global_bytes[0])?,
        extra_uv_count: global_bytes[1],
        vertex_index: IndexSize::from_byte("vertex", global_bytes[2])?,
        texture_index: IndexSize::from_byte("texture", global_bytes[3])?,
        material_index: IndexSize::from_byte("material", global_bytes[4])?,
        bone_index: IndexSize::from_byte("bone", global_bytes[5])?,
        morph_index: IndexSize::from_byte("morph", global_bytes[6])?,
        rigid_body_index: IndexSize::from_byte("rigid body", global_bytes[7])?,
    };

    let mut parser = Parser { input, globals };
    let info = ModelInfo {
        name: parser.read_string("model name")?,
        name_en: parser.read_string("model name")?,
        comment: parser.read_string("comment")?,
        comment_en: parser.read_string("comment")?,
    };

    let model = Model {
        version,
        globals,
        info,
        vertices: parser.read_section(Parser::read_vertex)?,
        faces: parser.read_faces()?,
        textures: parser.read_section(|p| p.read_string("texture path"))?,
        materials: parser.read_section(Parser::read_material)?,
        bones: parser.read_section(Parser::read_bone)?,
        morphs: parser.read_section(Parser::read_morph)?,
        display_nodes: parser.read_section(Parser::read_display_node)?,
        rigid_bodies: parser.read_section(Parser::read_rigid_body)?,
        joints: parser.read_section(Parser::read_joint)?,
        soft_bodies: parser.read_section(Parser::read_soft_body)?,
    };
    log::debug!(
        "read model {:?}: {} bones, {} vertices, {} rigid bodies",
        model.info.name,
        model.bones.len(),
        model.vertices.len(),
        model.rigid_bodies.len()
    );
    Ok(model)
}

impl<R: Read> Parser<'_, R> {
    /// Reads one counted section, or returns empty when the stream ended
    /// cleanly before the count.
    fn read_section<T>(&mut self, read: impl Fn(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let Some(count) = self.read_optional_count()? else {
            return Ok(Vec::new());
        };
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    /// The face count is in face vertices, three per triangle.
    fn read_faces(&mut self) -> Result<Vec<[i32; 3]>> {
        let Some(count) = self.read_optional_count()? else {
            return Ok(Vec::new());
        };
        let mut faces = Vec::with_capacity(count as usize / 3);
        for _ in 0..count / 3 {
            faces.push([
                self.read_vertex_index()?,
                self.read_vertex_index()?,
                self.read_vertex_index()?,
            ]);
        }
        Ok(faces)
    }

    fn read_optional_count(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = self.input.read(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(PmxError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += n;
        }
        let count = i32::from_le_bytes(buf);
        Ok(Some(count.max(0) as u32))
    }

    fn read_string(&mut self, context: &'static str) -> Result<String> {
        let length = self.input.read_i32::<LittleEndian>()?;
        if length < 0 {
            return Err(PmxError::Encoding { context });
        }
        let mut bytes = vec![0u8; length as usize];
        self.input.read_exact(&mut bytes)?;
        match self.globals.encoding {
            TextEncoding::Utf8 => {
                String::from_utf8(bytes).map_err(|_| PmxError::Encoding { context })
            }
            TextEncoding::Utf16Le => UTF_16LE
                .decode_without_bom_handling_and_without_replacement(&bytes)
                .map(|s| s.into_owned())
                .ok_or(PmxError::Encoding { context }),
        }
    }

    fn read_name(&mut self, context: &'static str) -> Result<(String, String)> {
        Ok((self.read_string(context)?, self.read_string(context)?))
    }

    /// Reads one signed cross-reference index of the given width.
    fn read_index_of(&mut self, size: IndexSize) -> Result<i32> {
        Ok(match size {
            IndexSize::U8 => i32::from(self.input.read_i8()?),
            IndexSize::U16 => i32::from(self.input.read_i16::<LittleEndian>()?),
            IndexSize::U32 => self.input.read_i32::<LittleEndian>()?,
        })
    }

    /// Vertex indices are unsigned at widths 1 and 2.
    fn read_vertex_index(&mut self) -> Result<i32> {
        Ok(match self.globals.vertex_index {
            IndexSize::U8 => i32::from(self.input.read_u8()?),
            IndexSize::U16 => i32::from(self.input.read_u16::<LittleEndian>()?),
            IndexSize::U32 => self.input.read_i32::<LittleEndian>()?,
        })
    }

    fn read_bone_index(&mut self) -> Result<i32> {
        self.read_index_of(self.globals.bone_index)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(self.input.read_f32::<LittleEndian>()?)
    }

    fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    fn read_quat(&mut self) -> Result<Quat> {
        Ok(Quat::from_xyzw(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    fn read_vertex(&mut self) -> Result<Vertex> {
        let position = self.read_vec3()?;
        let normal = self.read_vec3()?;
        let uv = [self.read_f32()?, self.read_f32()?];
        let mut extra_uvs = Vec::with_capacity(self.globals.extra_uv_count as usize);
        for _ in 0..self.globals.extra_uv_count {
            extra_uvs.push(self.read_vec4()?);
        }
        let kind = self.input.read_u8()?;
        let weights = match kind {
            0 => BoneWeights::Bdef1 {
                bone: self.read_bone_index()?,
            },
            1 => BoneWeights::Bdef2 {
                bones: [self.read_bone_index()?, self.read_bone_index()?],
                weight: self.read_f32()?,
            },
            2 | 4 => {
                let bones = [
                    self.read_bone_index()?,
                    self.read_bone_index()?,
                    self.read_bone_index()?,
                    self.read_bone_index()?,
                ];
                let weights = [
                    self.read_f32()?,
                    self.read_f32()?,
                    self.read_f32()?,
                    self.read_f32()?,
                ];
                if kind == 2 {
                    BoneWeights::Bdef4 { bones, weights }
                } else {
                    BoneWeights::Qdef { bones, weights }
                }
            }
            3 => BoneWeights::Sdef {
                bones: [self.read_bone_index()?, self.read_bone_index()?],
                weight: self.read_f32()?,
                c: self.read_vec3()?,
                r0: self.read_vec3()?,
                r1: self.read_vec3()?,
            },
            value => {
                return Err(PmxError::InvalidEnum {
                    field: "vertex weight kind",
                    value,
                });
            }
        };
        Ok(Vertex {
            position,
            normal,
            uv,
            extra_uvs,
            weights,
            edge_scale: self.read_f32()?,
        })
    }

    fn read_material(&mut self) -> Result<Material> {
        let (name, name_en) = self.read_name("material name")?;
        let diffuse = self.read_vec4()?;
        let specular = self.read_vec3()?;
        let specular_power = self.read_f32()?;
        let ambient = self.read_vec3()?;
        let draw_flags = self.input.read_u8()?;
        let edge_color = self.read_vec4()?;
        let edge_size = self.read_f32()?;
        let texture = self.read_index_of(self.globals.texture_index)?;
        let sphere_texture = self.read_index_of(self.globals.texture_index)?;
        let sphere_mode = self.input.read_u8()?;
        let toon_flag = self.input.read_u8()?;
        let toon = if toon_flag == 0 {
            ToonTexture::Texture(self.read_index_of(self.globals.texture_index)?)
        } else {
            ToonTexture::Shared(self.input.read_u8()?)
        };
        Ok(Material {
            name,
            name_en,
            diffuse,
            specular,
            specular_power,
            ambient,
            draw_flags,
            edge_color,
            edge_size,
            texture,
            sphere_texture,
            sphere_mode,
            toon,
            memo: self.read_string("material memo")?,
            face_vertex_count: self.input.read_i32::<LittleEndian>()?,
        })
    }

    fn read_bone(&mut self) -> Result<Bone> {
        let (name, name_en) = self.read_name("bone name")?;
        let position = self.read_vec3()?;
        let parent = self.read_bone_index()?;
        let transform_hierarchy = self.input.read_i32::<LittleEndian>()?;
        let flags = BoneFlags::from_bits_retain(self.input.read_u16::<LittleEndian>()?);

        let tail = if flags.contains(BoneFlags::TAIL_IS_BONE) {
            TailPosition::Bone(self.read_bone_index()?)
        } else {
            TailPosition::Offset(self.read_vec3()?)
        };
        let additional = if flags.intersects(BoneFlags::ADD_ROTATE | BoneFlags::ADD_TRANSLATE) {
            Some(AdditionalTransform {
                source: self.read_bone_index()?,
                weight: self.read_f32()?,
            })
        } else {
            None
        };
        let fixed_axis = if flags.contains(BoneFlags::AXIS_IS_FIXED) {
            Some(self.read_vec3()?)
        } else {
            None
        };
        let local_axes = if flags.contains(BoneFlags::LOCAL_AXES) {
            Some((self.read_vec3()?, self.read_vec3()?))
        } else {
            None
        };
        let external_parent = if flags.contains(BoneFlags::EXTERNAL_PARENT) {
            Some(self.input.read_i32::<LittleEndian>()?)
        } else {
            None
        };
        let ik = if flags.contains(BoneFlags::IS_IK) {
            let target = self.read_bone_index()?;
            let loop_count = self.input.read_i32::<LittleEndian>()?;
            let angle_limit = self.read_f32()?;
            let link_count = self.input.read_i32::<LittleEndian>()?;
            let mut links = Vec::with_capacity(link_count.max(0) as usize);
            for _ in 0..link_count.max(0) {
                let bone = self.read_bone_index()?;
                let limited = self.input.read_u8()? != 0;
                let limit = if limited {
                    Some((self.read_vec3()?, self.read_vec3()?))
                } else {
                    None
                };
                links.push(IkLink { bone, limit });
            }
            Some(Ik {
                target,
                loop_count,
                angle_limit,
                links,
            })
        } else {
            None
        };

        Ok(Bone {
            name,
            name_en,
            position,
            parent,
            transform_hierarchy,
            flags,
            tail,
            additional,
            fixed_axis,
            local_axes,
            external_parent,
            ik,
        })
    }

    fn read_morph(&mut self) -> Result<Morph> {
        let (name, name_en) = self.read_name("morph name")?;
        let panel = self.input.read_u8()?;
        let kind = self.input.read_u8()?;
        let count = self.input.read_i32::<LittleEndian>()?.max(0);
        let offsets = match kind {
            0 | 9 => {
                let mut refs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    refs.push(MorphRef {
                        morph: self.read_index_of(self.globals.morph_index)?,
                        weight: self.read_f32()?,
                    });
                }
                if kind == 0 {
                    MorphOffsets::Group(refs)
                } else {
                    MorphOffsets::Flip(refs)
                }
            }
            1 => {
                let mut offsets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    offsets.push(VertexOffset {
                        vertex: self.read_vertex_index()?,
                        offset: self.read_vec3()?,
                    });
                }
                MorphOffsets::Vertex(offsets)
            }
            2 => {
                let mut offsets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    offsets.push(BoneOffset {
                        bone: self.read_bone_index()?,
                        translation: self.read_vec3()?,
                        rotation: self.read_quat()?,
                    });
                }
                MorphOffsets::Bone(offsets)
            }
            3..=7 => {
                let mut offsets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    offsets.push(UvOffset {
                        vertex: self.read_vertex_index()?,
                        offset: self.read_vec4()?,
                    });
                }
                MorphOffsets::Uv {
                    channel: kind - 3,
                    offsets,
                }
            }
            8 => {
                let mut offsets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    offsets.push(MaterialOffset {
                        material: self.read_index_of(self.globals.material_index)?,
                        operation: self.input.read_u8()?,
                        diffuse: self.read_vec4()?,
                        specular: self.read_vec3()?,
                        specular_power: self.read_f32()?,
                        ambient: self.read_vec3()?,
                        edge_color: self.read_vec4()?,
                        edge_size: self.read_f32()?,
                        texture_tint: self.read_vec4()?,
                        sphere_tint: self.read_vec4()?,
                        toon_tint: self.read_vec4()?,
                    });
                }
                MorphOffsets::Material(offsets)
            }
            10 => {
                let mut offsets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    offsets.push(ImpulseOffset {
                        rigid_body: self.read_index_of(self.globals.rigid_body_index)?,
                        local: self.input.read_u8()? != 0,
                        velocity: self.read_vec3()?,
                        torque: self.read_vec3()?,
                    });
                }
                MorphOffsets::Impulse(offsets)
            }
            value => {
                return Err(PmxError::InvalidEnum {
                    field: "morph kind",
                    value,
                });
            }
        };
        Ok(Morph {
            name,
            name_en,
            panel,
            offsets,
        })
    }

    fn read_display_node(&mut self) -> Result<DisplayNode> {
        let (name, name_en) = self.read_name("display node name")?;
        let special = self.input.read_u8()? != 0;
        let count = self.input.read_i32::<LittleEndian>()?.max(0);
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind = self.input.read_u8()?;
            items.push(match kind {
                0 => DisplayItem::Bone(self.read_bone_index()?),
                1 => DisplayItem::Morph(self.read_index_of(self.globals.morph_index)?),
                value => {
                    return Err(PmxError::InvalidEnum {
                        field: "display item kind",
                        value,
                    });
                }
            });
        }
        Ok(DisplayNode {
            name,
            name_en,
            special,
            items,
        })
    }

    fn read_rigid_body(&mut self) -> Result<RigidBody> {
        let (name, name_en) = self.read_name("rigid body name")?;
        Ok(RigidBody {
            name,
            name_en,
            bone: self.read_bone_index()?,
            group: self.input.read_u8()?,
            collision_mask: self.input.read_u16::<LittleEndian>()?,
            shape: self.input.read_u8()?,
            size: self.read_vec3()?,
            position: self.read_vec3()?,
            rotation: self.read_vec3()?,
            mass: self.read_f32()?,
            linear_damping: self.read_f32()?,
            angular_damping: self.read_f32()?,
            restitution: self.read_f32()?,
            friction: self.read_f32()?,
            mode: self.input.read_u8()?,
        })
    }

    fn read_joint(&mut self) -> Result<Joint> {
        let (name, name_en) = self.read_name("joint name")?;
        // Every joint kind carries the full 6DOF payload.
        Ok(Joint {
            name,
            name_en,
            kind: self.input.read_u8()?,
            body_a: self.read_index_of(self.globals.rigid_body_index)?,
            body_b: self.read_index_of(self.globals.rigid_body_index)?,
            position: self.read_vec3()?,
            rotation: self.read_vec3()?,
            linear_lower: self.read_vec3()?,
            linear_upper: self.read_vec3()?,
            angular_lower: self.read_vec3()?,
            angular_upper: self.read_vec3()?,
            spring_linear: self.read_vec3()?,
            spring_angular: self.read_vec3()?,
        })
    }

    fn read_soft_body(&mut self) -> Result<SoftBody> {
        let (name, name_en) = self.read_name("soft body name")?;
        let shape = self.input.read_u8()?;
        let material = self.read_index_of(self.globals.material_index)?;
        let group = self.input.read_u8()?;
        let collision_mask = self.input.read_u16::<LittleEndian>()?;
        let flags = self.input.read_u8()?;
        let b_link_distance = self.input.read_i32::<LittleEndian>()?;
        let cluster_count = self.input.read_i32::<LittleEndian>()?;
        let total_mass = self.read_f32()?;
        let collision_margin = self.read_f32()?;
        let aero_model = self.input.read_i32::<LittleEndian>()?;

        let mut config = [0f32; 12];
        for v in &mut config {
            *v = self.read_f32()?;
        }
        let mut cluster = [0f32; 6];
        for v in &mut cluster {
            *v = self.read_f32()?;
        }
        let mut iterations = [0i32; 4];
        for v in &mut iterations {
            *v = self.input.read_i32::<LittleEndian>()?;
        }
        let mut material_coeffs = [0f32; 3];
        for v in &mut material_coeffs {
            *v = self.read_f32()?;
        }

        let anchor_count = self.input.read_i32::<LittleEndian>()?.max(0);
        let mut anchors = Vec::with_capacity(anchor_count as usize);
        for _ in 0..anchor_count {
            anchors.push(SoftBodyAnchor {
                rigid_body: self.read_index_of(self.globals.rigid_body_index)?,
                vertex: self.read_vertex_index()?,
                near: self.input.read_u8()? != 0,
            });
        }
        let pin_count = self.input.read_i32::<LittleEndian>()?.max(0);
        let mut pin_vertices = Vec::with_capacity(pin_count as usize);
        for _ in 0..pin_count {
            pin_vertices.push(self.read_vertex_index()?);
        }

        Ok(SoftBody {
            name,
            name_en,
            shape,
            material,
            group,
            collision_mask,
            flags,
            b_link_distance,
            cluster_count,
            total_mass,
            collision_margin,
            aero_model,
            config,
            cluster,
            iterations,
            material_coeffs,
            anchors,
            pin_vertices,
        })
    }
}
