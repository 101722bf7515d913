use crate::context::GpuContext;
use slotmap::new_key_type;
use std::fmt::{Debug, Formatter};
use std::ops::Range;
use strata_utils::debug_panic;

new_key_type! { pub struct BufferId; }

/// A buffer of `f32` values living in a [`GpuContext`].
///
/// The storage is released when the handle is dropped, so a buffer can never
/// be referenced after its owner let go of it.
pub struct GpuBuffer {
    id: BufferId,
    len: usize,
    context: GpuContext,
}

impl GpuBuffer {
    pub(crate) fn new(context: GpuContext, label: &str, contents: &[f32]) -> Self {
        let id = context.backend().create_buffer(label, contents);
        Self {
            id,
            len: contents.len(),
            context,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn write(&mut self, offset: usize, data: &[f32]) {
        if offset + data.len() > self.len {
            debug_panic!(
                "Write of {} floats at offset {offset} overflows buffer of {}",
                data.len(),
                self.len
            );
            let fit = self.len.saturating_sub(offset);
            if fit > 0 {
                self.context
                    .backend()
                    .write_buffer(self.id, offset, &data[..fit]);
            }
            return;
        }
        self.context.backend().write_buffer(self.id, offset, data);
    }

    /// Replaces the whole contents, reallocating when the length differs.
    pub fn upload(&mut self, data: &[f32]) {
        if data.len() != self.len {
            self.resize(data.len());
        }
        self.write(0, data);
    }

    pub fn resize(&mut self, len: usize) {
        if len == self.len {
            return;
        }
        self.context.backend().resize_buffer(self.id, len);
        self.len = len;
    }

    /// Copies the overlapping prefix of `source` into this buffer.
    pub fn copy_from(&mut self, source: &GpuBuffer) {
        self.copy_range_from(source, 0..self.len.min(source.len));
    }

    /// Copies `range` of `source` into the same range of this buffer.
    pub fn copy_range_from(&mut self, source: &GpuBuffer, range: Range<usize>) {
        let end = range.end.min(self.len).min(source.len);
        if range.start >= end {
            return;
        }
        self.context
            .backend()
            .copy_buffer(source.id, self.id, range.start, end - range.start);
    }

    pub fn read(&self) -> Vec<f32> {
        self.context.backend().read_buffer(self.id)
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.context.backend().destroy_buffer(self.id);
    }
}

impl Debug for GpuBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}
