//! Frame-scoped numbering of lights and texture units.
//!
//! Shadow maps always take texture units `0..N` for the N lights of a pass;
//! every other sampled input of the same draw is numbered from `N` upwards.

use super::lights::LightType;
use super::shader::ShaderProgram;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightCounts {
    pub directional: u32,
    pub point: u32,
    /// Spot and flash lights share one shader array.
    pub spot: u32,
}

impl LightCounts {
    pub fn total(&self) -> u32 {
        self.directional + self.point + self.spot
    }

    pub fn upload<P: ShaderProgram + ?Sized>(&self, program: &mut P) {
        program.set_int("dirNum", self.directional as i32);
        program.set_int("pointNum", self.point as i32);
        program.set_int("spotNum", self.spot as i32);
    }
}

/// Where one light lands in the shader: its shadow sampler unit and its
/// element in the per-type array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightSlot {
    pub depth_map_index: u32,
    pub type_name: &'static str,
    pub type_index: u32,
}

#[derive(Debug, Default)]
pub struct SlotAllocator {
    counts: LightCounts,
    depth_maps: u32,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, light_type: LightType) -> LightSlot {
        let counter = match light_type {
            LightType::Directional => &mut self.counts.directional,
            LightType::Point => &mut self.counts.point,
            LightType::Spot | LightType::Flash => &mut self.counts.spot,
        };
        let type_index = *counter;
        *counter += 1;

        let depth_map_index = self.depth_maps;
        self.depth_maps += 1;

        LightSlot {
            depth_map_index,
            type_name: light_type.uniform_name(),
            type_index,
        }
    }

    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    pub fn depth_maps(&self) -> u32 {
        self.depth_maps
    }
}

/// Sequential texture units for a single draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureUnits {
    first: u32,
    next: u32,
}

impl TextureUnits {
    pub fn starting_at(first: u32) -> Self {
        Self { first, next: first }
    }

    pub fn after_shadow_maps(light_count: usize) -> Self {
        Self::starting_at(light_count as u32)
    }

    pub fn allocate(&mut self) -> u32 {
        let unit = self.next;
        self.next += 1;
        unit
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    /// Units handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next - self.first
    }
}
