// SPDX-License-Identifier: AGPL-3.0-only

//! GPU FP64 compute context for the interaction pipeline.
//!
//! Creates a wgpu device with `SHADER_F64` enabled and provides helpers
//! for running f64 compute shaders on any Vulkan GPU (NVIDIA proprietary,
//! NVK/nouveau, RADV, etc.).
//!
//! ## Adapter selection
//!
//! Set `RIPTIDE_GPU_ADAPTER` to select a specific GPU:
//!
//! | Value | Behavior |
//! |-------|----------|
//! | `auto` | discrete adapter with `SHADER_F64`, integrated fallback |
//! | `0`, `1`, … | Select adapter by enumeration index |
//! | substring | Case-insensitive name match (e.g. `"titan"`, `"4070"`) |
//! | *(unset)* | Same as `auto` |
//!
//! Use `GpuF64::enumerate_adapters` to list available GPUs before selecting.
//!
//! ## Module structure
//!
//! - `adapter` — adapter discovery and selection
//! - `buffers` — f64/u32 buffer creation, upload, readback
//! - `dispatch` — command encoding and dispatch

mod adapter;
mod buffers;
mod dispatch;

pub use adapter::AdapterInfo;
pub use dispatch::split_workgroups;

use crate::error::RiptideError;
use std::sync::Arc;

/// GPU context with FP64 support.
#[must_use]
pub struct GpuF64 {
    pub adapter_name: String,
    pub has_f64: bool,
    pub has_timestamps: bool,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

// ── Core accessors ───────────────────────────────────────────────────

impl GpuF64 {
    /// Access the underlying wgpu Device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access the underlying wgpu Queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get Arc-wrapped device (for APIs requiring `Arc<Device>`).
    #[must_use]
    pub fn device_arc(&self) -> Arc<wgpu::Device> {
        Arc::clone(&self.device)
    }

    /// Get Arc-wrapped queue (for APIs requiring `Arc<Queue>`).
    #[must_use]
    pub fn queue_arc(&self) -> Arc<wgpu::Queue> {
        Arc::clone(&self.queue)
    }
}

// ── Constructor ──────────────────────────────────────────────────────

impl GpuF64 {
    /// Create GPU device requesting `SHADER_F64`.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::NoAdapter`] when no adapter exists,
    /// [`RiptideError::NoShaderF64`] when the selected adapter lacks f64
    /// shader support, and [`RiptideError::DeviceCreation`] when device
    /// creation fails.
    pub async fn new() -> Result<Self, RiptideError> {
        let selected = adapter::select_adapter()?;
        let adapter_info = selected.get_info();
        let adapter_features = selected.features();

        if !adapter_features.contains(wgpu::Features::SHADER_F64) {
            return Err(RiptideError::NoShaderF64);
        }

        let mut required_features = wgpu::Features::SHADER_F64;
        if adapter_features.contains(wgpu::Features::TIMESTAMP_QUERY) {
            required_features |= wgpu::Features::TIMESTAMP_QUERY;
        }

        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: 512 * 1024 * 1024,
            max_buffer_size: 1024 * 1024 * 1024,
            max_storage_buffers_per_shader_stage: 12,
            ..wgpu::Limits::default()
        };

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("riptide interaction device"),
                    required_features,
                    required_limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| RiptideError::DeviceCreation(e.to_string()))?;

        Ok(Self {
            adapter_name: adapter_info.name,
            has_f64: true,
            has_timestamps: required_features.contains(wgpu::Features::TIMESTAMP_QUERY),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Enumerate all available GPU adapters.
    #[must_use]
    pub fn enumerate_adapters() -> Vec<AdapterInfo> {
        adapter::enumerate_adapters()
    }

    /// Print device capabilities.
    pub fn print_info(&self) {
        println!("  GPU: {}", self.adapter_name);
        println!("  SHADER_F64: {}", if self.has_f64 { "YES" } else { "NO" });
        println!(
            "  TIMESTAMP_QUERY: {}",
            if self.has_timestamps { "YES" } else { "NO" }
        );
    }

    /// Print all available adapters to stdout.
    pub fn print_available_adapters() {
        let adapters = Self::enumerate_adapters();
        println!("  Available GPU adapters:");
        for info in &adapters {
            let marker = if info.has_f64 { "✓" } else { "✗" };
            println!("    {marker} {info}");
        }
        if adapters.is_empty() {
            println!("    (none found)");
        }
    }
}

// ── Pipeline creation ────────────────────────────────────────────────

impl GpuF64 {
    /// Compile a WGSL compute shader into a pipeline with entry point
    /// `main` and auto bind group layout.
    #[must_use]
    pub fn create_pipeline(&self, shader_source: &str, label: &str) -> wgpu::ComputePipeline {
        let shader_module = self
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shader_source.into()),
            });

        self.device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &shader_module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
    }
}
