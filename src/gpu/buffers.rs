// SPDX-License-Identifier: AGPL-3.0-only

//! GPU buffer creation, upload, and readback for f64/u32 pipeline data.

use super::GpuF64;
use crate::error::RiptideError;

impl GpuF64 {
    /// Create a storage buffer from f64 data (read-only)
    #[must_use]
    pub fn create_f64_buffer(&self, data: &[f64], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            })
    }

    /// Create a writable storage buffer for f64 output
    #[must_use]
    pub fn create_f64_output_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count * 8) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a writable storage buffer for u32 output
    #[must_use]
    pub fn create_u32_output_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for reading results back to CPU
    #[must_use]
    pub fn create_staging_buffer(&self, size: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer from raw bytes
    #[must_use]
    pub fn create_uniform_buffer(&self, data: &[u8], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Create a storage buffer from u32 data.
    ///
    /// Includes `COPY_DST` so neighbor-list buffers can be re-uploaded
    /// when the pipeline rebuilds with a larger capacity.
    #[must_use]
    pub fn create_u32_buffer(&self, data: &[u32], label: &str) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Upload f64 data to a GPU storage buffer (overwrites from offset 0).
    pub fn upload_f64(&self, buffer: &wgpu::Buffer, data: &[f64]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.queue().write_buffer(buffer, 0, &bytes);
    }

    /// Upload u32 data to a GPU storage buffer (overwrites from offset 0).
    pub fn upload_u32(&self, buffer: &wgpu::Buffer, data: &[u32]) {
        self.queue().write_buffer(buffer, 0, bytemuck::cast_slice(data));
    }

    /// Read back f64 data from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::GpuCompute`] if the GPU map callback fails
    /// or the channel is dropped.
    pub fn read_back_f64(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<f64>, RiptideError> {
        let bytes = self.read_back_bytes(buffer, count * 8)?;
        Ok(mapped_bytes_to_f64(&bytes))
    }

    /// Read back u32 data from a GPU buffer via staging copy.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::GpuCompute`] if the GPU map callback fails
    /// or the channel is dropped.
    pub fn read_back_u32(
        &self,
        buffer: &wgpu::Buffer,
        count: usize,
    ) -> Result<Vec<u32>, RiptideError> {
        let bytes = self.read_back_bytes(buffer, count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| {
                let mut b = [0u8; 4];
                b.copy_from_slice(chunk);
                u32::from_le_bytes(b)
            })
            .collect())
    }

    fn read_back_bytes(
        &self,
        buffer: &wgpu::Buffer,
        size: usize,
    ) -> Result<Vec<u8>, RiptideError> {
        let staging = self.create_staging_buffer(size, "readback");
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size as u64);
        self.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| {
                RiptideError::GpuCompute("GPU map callback: channel recv failed".into())
            })?
            .map_err(|e| RiptideError::GpuCompute(format!("GPU buffer mapping: {e}")))?;

        let data = slice.get_mapped_range();
        let result = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }
}

/// Convert mapped GPU buffer bytes to f64 values.
///
/// GPU mapped buffers are typically page-aligned, so `bytemuck::try_cast_slice`
/// will succeed. Falls back to manual byte conversion if alignment is wrong.
pub fn mapped_bytes_to_f64(data: &[u8]) -> Vec<f64> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(8)
                .map(|chunk| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_le_bytes(b)
                })
                .collect()
        },
        <[f64]>::to_vec,
    )
}
