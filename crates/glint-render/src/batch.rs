//! Fixed-capacity vertex batch.
//!
//! Quads accumulate here until something forces a flush: a binding change,
//! a full buffer, a state change or a present. The buffer never grows and
//! never drops geometry; a quad that does not fit is refused and the caller
//! flushes.

use crate::geometry::{Quad, QUAD_VERTICES};
use glint_test_utils::BatchVertex;

/// Room for 4096 quads.
pub const DEFAULT_BATCH_CAPACITY: usize = QUAD_VERTICES * 4096;

/// Returned by [`BatchBuffer::try_push_quad`] when the quad does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFull;

#[derive(Debug)]
pub struct BatchBuffer {
    vertices: Vec<BatchVertex>,
    capacity: usize,
}

impl BatchBuffer {
    /// A buffer holding `capacity` vertices, never less than one quad.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(QUAD_VERTICES);
        Self {
            vertices: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / QUAD_VERTICES
    }

    pub fn has_room_for_quad(&self) -> bool {
        self.vertices.len() + QUAD_VERTICES <= self.capacity
    }

    pub fn try_push_quad(&mut self, quad: &Quad) -> Result<(), BatchFull> {
        if !self.has_room_for_quad() {
            return Err(BatchFull);
        }
        self.vertices.extend_from_slice(quad);
        Ok(())
    }

    pub fn vertices(&self) -> &[BatchVertex] {
        &self.vertices
    }

    pub(crate) fn reset(&mut self) {
        self.vertices.clear();
    }
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BATCH_CAPACITY)
    }
}
