//! Byte layout of a WGSL `var<uniform>` block addressed by GLSL-style names.
//!
//! Offsets follow the uniform address space rules: scalars align to 4,
//! `vec3`/`vec4`/`mat4x4` to 16, structs to their widest member and every
//! array stride (and struct size) is rounded up to 16.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Bool,
    Vec3,
    Mat4,
}

impl UniformKind {
    pub const fn size(self) -> u32 {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Mat4 => 64,
        }
    }

    pub const fn align(self) -> u32 {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool => 4,
            UniformKind::Vec3 | UniformKind::Mat4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Clone, Debug, Default)]
pub struct UniformLayout {
    slots: HashMap<String, UniformSlot>,
    size: u32,
}

fn align_to(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

impl UniformLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, kind: UniformKind) -> Self {
        let offset = align_to(self.size, kind.align());
        self.slots.insert(name.to_owned(), UniformSlot { offset, kind });
        self.size = offset + kind.size();
        self
    }

    /// `name[0]` .. `name[count - 1]`.
    pub fn array(mut self, name: &str, kind: UniformKind, count: usize) -> Self {
        let stride = align_to(kind.size(), 16);
        let base = align_to(self.size, 16);
        for i in 0..count {
            self.slots.insert(
                format!("{name}[{i}]"),
                UniformSlot {
                    offset: base + stride * i as u32,
                    kind,
                },
            );
        }
        self.size = base + stride * count as u32;
        self
    }

    /// `name[i].member` for an array of structs.
    pub fn struct_array(mut self, name: &str, count: usize, members: &[(&str, UniformKind)]) -> Self {
        let mut member_offsets = Vec::with_capacity(members.len());
        let mut cursor = 0u32;
        for (_, kind) in members {
            let offset = align_to(cursor, kind.align());
            member_offsets.push(offset);
            cursor = offset + kind.size();
        }
        let stride = align_to(cursor, 16);
        let base = align_to(self.size, 16);

        for i in 0..count {
            let element = base + stride * i as u32;
            for ((member, kind), offset) in members.iter().zip(&member_offsets) {
                self.slots.insert(
                    format!("{name}[{i}].{member}"),
                    UniformSlot {
                        offset: element + offset,
                        kind: *kind,
                    },
                );
            }
        }
        self.size = base + stride * count as u32;
        self
    }

    pub fn slot(&self, name: &str) -> Option<UniformSlot> {
        self.slots.get(name).copied()
    }

    /// Buffer size, padded to 16 bytes and never zero.
    pub fn byte_size(&self) -> u64 {
        align_to(self.size.max(1), 16) as u64
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_pack_after_vec3() {
        let layout = UniformLayout::new()
            .field("viewPos", UniformKind::Vec3)
            .field("exposure", UniformKind::Float)
            .field("hdr", UniformKind::Bool);

        assert_eq!(layout.slot("viewPos").unwrap().offset, 0);
        assert_eq!(layout.slot("exposure").unwrap().offset, 12);
        assert_eq!(layout.slot("hdr").unwrap().offset, 16);
        assert_eq!(layout.byte_size(), 32);
    }

    #[test]
    fn mat4_array_uses_64_byte_stride() {
        let layout = UniformLayout::new()
            .field("far", UniformKind::Float)
            .array("shadowMatrices", UniformKind::Mat4, 6);

        assert_eq!(layout.slot("shadowMatrices[0]").unwrap().offset, 16);
        assert_eq!(layout.slot("shadowMatrices[5]").unwrap().offset, 16 + 5 * 64);
        assert_eq!(layout.byte_size(), 16 + 6 * 64);
    }

    #[test]
    fn struct_array_rounds_stride_to_16() {
        let layout = UniformLayout::new().struct_array(
            "points",
            2,
            &[
                ("position", UniformKind::Vec3),
                ("constant", UniformKind::Float),
                ("diffuse", UniformKind::Vec3),
            ],
        );

        // position 0..12, constant 12..16, diffuse 16..28 -> stride 32
        assert_eq!(layout.slot("points[0].constant").unwrap().offset, 12);
        assert_eq!(layout.slot("points[1].position").unwrap().offset, 32);
        assert_eq!(layout.slot("points[1].diffuse").unwrap().offset, 48);
        assert_eq!(layout.len(), 6);
    }

    #[test]
    fn empty_layout_still_has_a_buffer() {
        assert!(UniformLayout::new().is_empty());
        assert_eq!(UniformLayout::new().byte_size(), 16);
    }
}
