use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque index into one of a device's resource tables.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

// Manual impls so the marker type needs no bounds of its own.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{}#{}", short, self.index)
    }
}

impl<T> Handle<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Marker for texture handles.
pub enum Texture {}
/// Marker for framebuffer handles.
pub enum Framebuffer {}
/// Marker for vertex array handles.
pub enum VertexArray {}
/// Marker for uniform buffer handles.
pub enum UniformBuffer {}

pub type TextureHandle = Handle<Texture>;
pub type FramebufferHandle = Handle<Framebuffer>;
pub type VertexArrayHandle = Handle<VertexArray>;
pub type UniformBufferHandle = Handle<UniformBuffer>;
