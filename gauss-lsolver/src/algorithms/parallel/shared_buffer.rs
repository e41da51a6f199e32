use std::num::NonZeroUsize;
use std::ptr::NonNull;

use gauss_core::GaussCoreError;
use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

use super::worker::RegionView;

/// An anonymous `MAP_SHARED` mapping of `f64` values.
///
/// Forked workers inherit the mapping, so writes from any process are visible
/// to all of them. The mapping is released exactly once, when the buffer is
/// dropped.
#[derive(Debug)]
pub(crate) struct SharedBuffer {
    ptr: NonNull<f64>,
    len: usize,
}

impl SharedBuffer {
    /// Maps `len` zeroed values.
    pub fn allocate(len: usize) -> Result<Self, GaussCoreError> {
        let bytes = len
            .checked_mul(std::mem::size_of::<f64>())
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                GaussCoreError::ResourceError(format!("cannot map a buffer of {} values", len))
            })?;

        // SAFETY: a fresh anonymous mapping does not alias any existing memory.
        let ptr = unsafe {
            mmap_anonymous(
                None,
                bytes,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|e| GaussCoreError::ResourceError(format!("mmap failed: {}", e)))?;

        log::trace!("Mapped shared buffer of {} bytes", bytes);
        Ok(Self {
            ptr: ptr.cast(),
            len,
        })
    }

    /// Maps a buffer and copies `values` into it.
    pub fn from_slice(values: &[f64]) -> Result<Self, GaussCoreError> {
        let mut buffer = Self::allocate(values.len())?;
        buffer.as_mut_slice().copy_from_slice(values);
        Ok(buffer)
    }

    pub fn as_slice(&self) -> &[f64] {
        // SAFETY: the mapping holds `len` initialised values for our lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        // SAFETY: as above, and `&mut self` excludes other in-process borrows.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// A view of the buffer as rows of `width` values, handed to workers.
    ///
    /// Takes `&mut self` so no in-process slice of the buffer is alive while
    /// the view can write through it.
    pub fn region(&mut self, width: usize) -> RegionView<'_> {
        let rows = if width == 0 { 0 } else { self.len / width };
        // SAFETY: the mapping outlives the returned view.
        unsafe { RegionView::from_raw(self.ptr, rows, width) }
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        let bytes = self.len * std::mem::size_of::<f64>();
        // SAFETY: ptr/bytes describe the mapping created in `allocate`, and no
        // view of it outlives `self`.
        if let Err(e) = unsafe { munmap(self.ptr.cast(), bytes) } {
            log::warn!("munmap of shared buffer failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_in_and_region() {
        let mut buffer = SharedBuffer::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(buffer.as_slice().len(), 6);
        let region = buffer.region(3);
        assert_eq!(region.rows(), 2);
        assert_eq!(region.get(1, 2), 6.0);
    }

    #[test]
    fn test_region_writes_are_visible_once_the_view_is_released() {
        use super::super::transport::{TaskMessage, STATUS_OK};
        use super::super::worker::execute_task;

        let mut buffer = SharedBuffer::from_slice(&[2.0, 1.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let status = execute_task(&TaskMessage::work(0, 1..2), &buffer.region(3));
        assert_eq!(status, STATUS_OK);
        assert_eq!(&buffer.as_slice()[3..], &[0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_zero_length_is_a_resource_error() {
        assert!(matches!(
            SharedBuffer::allocate(0),
            Err(GaussCoreError::ResourceError(_))
        ));
    }
}
