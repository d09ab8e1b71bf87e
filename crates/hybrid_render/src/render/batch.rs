//! CPU staging arrays mirrored into GPU buffers

use bytemuck::Pod;

use crate::backend::{BufferKind, GpuBufferId, GraphicsBackend};

/// Fixed-capacity CPU array backed by a GPU buffer of the same size.
///
/// Elements are staged on the CPU with [`push`](Self::push) or
/// [`extend`](Self::extend) and written to the GPU with
/// [`upload`](Self::upload) or [`upload_range`](Self::upload_range).
#[derive(Debug)]
pub struct StagingBuffer<T: Pod> {
    kind: BufferKind,
    capacity: usize,
    cpu: Vec<T>,
    gpu: GpuBufferId,
}

impl<T: Pod> StagingBuffer<T> {
    /// Describe a buffer; nothing is allocated until [`allocate`](Self::allocate)
    pub fn new(kind: BufferKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            cpu: Vec::new(),
            gpu: GpuBufferId::INVALID,
        }
    }

    /// Allocate the CPU array and the GPU buffer
    pub fn allocate(&mut self, backend: &mut dyn GraphicsBackend) {
        self.cpu = Vec::with_capacity(self.capacity);
        self.gpu = backend.create_buffer(self.kind, self.capacity * std::mem::size_of::<T>());
    }

    /// Backend buffer
    pub fn gpu(&self) -> GpuBufferId {
        self.gpu
    }

    /// Maximum element count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Staged element count
    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    /// Free element slots
    pub fn remaining(&self) -> usize {
        self.capacity - self.cpu.len()
    }

    /// Staged elements
    pub fn as_slice(&self) -> &[T] {
        &self.cpu
    }

    /// Stage one element; `false` when full
    pub fn push(&mut self, value: T) -> bool {
        if self.cpu.len() >= self.capacity {
            return false;
        }
        self.cpu.push(value);
        true
    }

    /// Stage a slice and return the index of its first element; `None` when
    /// it does not fit
    pub fn extend(&mut self, values: &[T]) -> Option<usize> {
        if values.len() > self.remaining() {
            return None;
        }
        let start = self.cpu.len();
        self.cpu.extend_from_slice(values);
        Some(start)
    }

    /// Write every staged element to the start of the GPU buffer
    pub fn upload(&self, backend: &mut dyn GraphicsBackend) {
        if !self.cpu.is_empty() {
            backend.write_buffer(self.gpu, 0, bytemuck::cast_slice(&self.cpu));
        }
    }

    /// Write staged elements `start..end` to the same position on the GPU
    pub fn upload_range(&self, backend: &mut dyn GraphicsBackend, start: usize, end: usize) {
        let end = end.min(self.cpu.len());
        if start >= end {
            return;
        }
        let offset = start * std::mem::size_of::<T>();
        backend.write_buffer(self.gpu, offset, bytemuck::cast_slice(&self.cpu[start..end]));
    }

    /// Drop staged elements; the GPU buffer is kept
    pub fn clear(&mut self) {
        self.cpu.clear();
    }

    /// Release the GPU buffer
    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.gpu.is_valid() {
            backend.delete_buffer(self.gpu);
            self.gpu = GpuBufferId::INVALID;
        }
        self.cpu = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn test_capacity_is_enforced() {
        let mut backend = RecordingBackend::new();
        let mut buffer: StagingBuffer<u32> = StagingBuffer::new(BufferKind::Index, 4);
        buffer.allocate(&mut backend);
        assert_eq!(buffer.extend(&[1, 2, 3]), Some(0));
        assert_eq!(buffer.extend(&[4, 5]), None);
        assert!(buffer.push(4));
        assert!(!buffer.push(5));
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_upload_range_writes_at_offset() {
        let mut backend = RecordingBackend::new();
        let mut buffer: StagingBuffer<u32> = StagingBuffer::new(BufferKind::Index, 4);
        buffer.allocate(&mut backend);
        buffer.extend(&[7, 8, 9]);
        buffer.upload_range(&mut backend, 1, 3);

        let data = backend.buffer_data(buffer.gpu()).unwrap();
        let words: Vec<u32> = data.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect();
        assert_eq!(words, vec![0, 8, 9, 0]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let mut buffer: StagingBuffer<u32> = StagingBuffer::new(BufferKind::Vertex, 4);
        buffer.allocate(&mut backend);
        buffer.release(&mut backend);
        buffer.release(&mut backend);
        assert_eq!(backend.live_buffers(BufferKind::Vertex), 0);
        assert!(!buffer.gpu().is_valid());
    }
}
