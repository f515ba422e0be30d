use crate::{Error, Result, WasmType};
use std::ops::Range;

/// A bounds-checked window onto a runtime's linear memory.
///
/// A view borrows the memory as it was when the view was created. Growing the
/// memory with [`Runtime::resize_memory`](crate::Runtime::resize_memory)
/// requires the runtime mutably, so a view can never observe a stale size; a
/// fresh view must be taken after any resize.
///
/// Every access is checked against the size of the view. An access is valid
/// when its offset lies strictly inside the memory and its end does not run
/// past it, so even a zero-length access at the very end of the memory is
/// rejected. Invalid accesses fail with [`Error::InvalidMemoryAccess`] and
/// never partially write.
///
/// Typed reads and writes treat memory as a tightly packed little-endian
/// array of the requested [`WasmType`] with no alignment requirement.
#[derive(Debug)]
pub struct MemoryView<'a> {
    data: &'a mut [u8],
}

impl<'a> MemoryView<'a> {
    /// Creates a view over `data`.
    pub fn new(data: &'a mut [u8]) -> MemoryView<'a> {
        MemoryView { data }
    }

    /// Creates a view from the memory pointer handed to a host function.
    ///
    /// # Safety
    ///
    /// Unless `len` is zero, `ptr` must be valid for reads and writes of
    /// `len` bytes for `'a` and not be accessed through any other pointer
    /// during `'a`.
    pub(crate) unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> MemoryView<'a> {
        MemoryView {
            data: unsafe { wasmlink_engine::slice_from_raw_parts_mut(ptr, len) },
        }
    }

    /// Size of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the memory has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole memory.
    pub fn as_slice(&self) -> &[u8] {
        self.data
    }

    /// Returns whether `len` bytes starting at `offset` may be accessed.
    pub fn valid(&self, offset: usize, len: usize) -> bool {
        offset < self.data.len()
            && offset
                .checked_add(len)
                .is_some_and(|end| end <= self.data.len())
    }

    fn range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        if self.valid(offset, len) {
            Ok(offset..offset + len)
        } else {
            log::trace!(
                "rejected access of {len} bytes at {offset} in {} byte memory",
                self.data.len()
            );
            Err(Error::InvalidMemoryAccess)
        }
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    /// Fills `buf` with the bytes starting at `offset`.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(self.read_bytes(offset, buf.len())?);
        Ok(())
    }

    /// Reads `count` consecutive values of type `T` starting at `offset`.
    pub fn read_values<T: WasmType>(&self, offset: usize, count: usize) -> Result<Vec<T>> {
        let len = count
            .checked_mul(T::BYTES)
            .ok_or(Error::InvalidMemoryAccess)?;
        let bytes = self.read_bytes(offset, len)?;
        Ok(bytes.chunks_exact(T::BYTES).map(T::read_le).collect())
    }

    /// Reads a single value of type `T` at `offset`.
    pub fn read_value<T: WasmType>(&self, offset: usize) -> Result<T> {
        Ok(T::read_le(self.read_bytes(offset, T::BYTES)?))
    }

    /// Decodes `len` bytes starting at `offset` as UTF-8, replacing invalid
    /// sequences with U+FFFD.
    pub fn read_string(&self, offset: usize, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.read_bytes(offset, len)?).into_owned())
    }

    /// Copies `bytes` into memory starting at `offset`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes `values` as a packed array starting at `offset`.
    pub fn write_values<T: WasmType>(&mut self, offset: usize, values: &[T]) -> Result<()> {
        let len = values
            .len()
            .checked_mul(T::BYTES)
            .ok_or(Error::InvalidMemoryAccess)?;
        let range = self.range(offset, len)?;
        for (chunk, value) in self.data[range].chunks_exact_mut(T::BYTES).zip(values) {
            value.write_le(chunk);
        }
        Ok(())
    }

    /// Writes a single value of type `T` at `offset`.
    pub fn write_value<T: WasmType>(&mut self, offset: usize, value: T) -> Result<()> {
        self.write_values(offset, &[value])
    }

    /// Writes the UTF-8 bytes of `s` starting at `offset`. No terminator is
    /// written.
    pub fn write_str(&mut self, offset: usize, s: &str) -> Result<()> {
        self.write(offset, s.as_bytes())
    }
}
