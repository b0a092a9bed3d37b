use std::collections::HashMap;

use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Name-addressed uniform interface of a compiled shader program.
///
/// Unknown names are ignored by implementations, the same way a graphics
/// API ignores a uniform the compiler optimised away.
pub trait ShaderProgram {
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.set_uniform(name, UniformValue::Vec3(value));
    }

    fn set_mat4(&mut self, name: &str, value: Mat4) {
        self.set_uniform(name, UniformValue::Mat4(value));
    }
}

/// `"<type_name>s[<index>].<field>"`, e.g. `points[2].position`.
pub fn array_uniform(type_name: &str, index: usize, field: &str) -> String {
    format!("{type_name}s[{index}].{field}")
}

/// CPU-side program that keeps every uniform it receives.
///
/// Used with the recording backend for frame capture and tests.
#[derive(Debug, Default, Clone)]
pub struct UniformTable {
    label: String,
    values: HashMap<String, UniformValue>,
    writes: usize,
}

impl UniformTable {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.get(name).copied()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            UniformValue::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            UniformValue::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            UniformValue::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(value) => Some(value),
            _ => None,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            UniformValue::Mat4(value) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Total number of setter calls, including overwrites.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.writes = 0;
    }
}

impl ShaderProgram for UniformTable {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.writes += 1;
        self.values.insert(name.to_owned(), value);
    }
}
