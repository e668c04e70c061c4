//! Bounded vertex buffer feeding the render backend.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// A textured rectangle: screen positions and normalized atlas
/// coordinates of two opposite corners.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quad {
    pub p0: Vec2,
    pub p1: Vec2,
    pub uv0: Vec2,
    pub uv1: Vec2,
}

/// Triangle-list vertices stored as separate position, texcoord and
/// color arrays.
pub(crate) struct Batch {
    positions: Vec<Vec2>,
    texcoords: Vec<Vec2>,
    colors: Vec<u32>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            texcoords: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether `count` more vertices fit without flushing.
    pub fn has_room(&self, count: usize) -> bool {
        self.len() + count <= self.capacity
    }

    pub fn push_vertex(&mut self, position: Vec2, texcoord: Vec2, color: u32) {
        self.positions.push(position);
        self.texcoords.push(texcoord);
        self.colors.push(color);
    }

    /// Appends the two triangles covering `quad`.
    pub fn push_quad(&mut self, quad: &Quad, color: u32) {
        let Quad { p0, p1, uv0, uv1 } = *quad;
        self.push_vertex(p0, uv0, color);
        self.push_vertex(p1, uv1, color);
        self.push_vertex(Vec2::new(p1.x, p0.y), Vec2::new(uv1.x, uv0.y), color);

        self.push_vertex(p0, uv0, color);
        self.push_vertex(Vec2::new(p0.x, p1.y), Vec2::new(uv0.x, uv1.y), color);
        self.push_vertex(p1, uv1, color);
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn texcoords(&self) -> &[Vec2] {
        &self.texcoords
    }

    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.texcoords.clear();
        self.colors.clear();
    }
}
