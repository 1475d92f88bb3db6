// SPDX-License-Identifier: AGPL-3.0-only

//! GPU-resident interaction pipeline.
//!
//! All five stages run on the device; the CPU reads back exactly two
//! control points per invocation: the discovery cursor (to detect
//! neighbor-buffer overflow before any force is written) and the final
//! forces/energies. Buffers are created once per capacity and reused
//! across invocations; only positions are re-uploaded step to step.
//!
//! Fixed-point forces come back as split lo/hi u32 words and are
//! reassembled to i64 on the host, so GPU and CPU accumulation share the
//! same bit-identity guarantee.

use crate::error::RiptideError;
use crate::force::ManyParticleForce;
use crate::gpu::GpuF64;
use crate::interactions::exclusions::ExclusionSet;
use crate::interactions::shaders;
use crate::tolerances::{FORCE_SCALE, MAX_GPU_TYPE_ID, TILE_WIDTH};

/// Per-particle parameters the GPU layout carries (padded vec4).
pub const GPU_PARAM_STRIDE: usize = 4;

/// Output of one GPU pipeline invocation.
#[derive(Debug, Clone)]
pub struct GpuEvaluationResult {
    /// Per-particle forces, stride 3.
    pub forces: Vec<f64>,
    /// Total energy, summed on the host in anchor order.
    pub energy: f64,
    /// Pairs accepted by discovery.
    pub pair_count: usize,
    /// Groups the potential ran on.
    pub group_count: u64,
}

/// Device buffers and compiled pipelines for one force configuration.
pub struct GpuInteractionPipeline {
    n: u32,
    n_tiles: u32,
    capacity: u32,
    box_vectors: Option<[f64; 3]>,

    positions_buf: wgpu::Buffer,
    centers_buf: wgpu::Buffer,
    half_extents_buf: wgpu::Buffer,
    excl_starts_buf: wgpu::Buffer,
    excl_indices_buf: wgpu::Buffer,
    pairs_buf: wgpu::Buffer,
    counts_buf: wgpu::Buffer,
    cursor_buf: wgpu::Buffer,
    offsets_buf: wgpu::Buffer,
    cursors_buf: wgpu::Buffer,
    neighbors_buf: wgpu::Buffer,
    params_buf: wgpu::Buffer,
    types_buf: wgpu::Buffer,
    force_lo_buf: wgpu::Buffer,
    force_hi_buf: wgpu::Buffer,
    energies_buf: wgpu::Buffer,
    group_counts_buf: wgpu::Buffer,

    bounds_pipeline: wgpu::ComputePipeline,
    discovery_pipeline: wgpu::ComputePipeline,
    scan_pipeline: wgpu::ComputePipeline,
    scatter_pipeline: wgpu::ComputePipeline,
    evaluate_pipeline: wgpu::ComputePipeline,

    bounds_params_buf: wgpu::Buffer,
    discovery_params_buf: wgpu::Buffer,
    scan_params_buf: wgpu::Buffer,
    scatter_params_buf: wgpu::Buffer,
    evaluate_params_buf: wgpu::Buffer,
}

fn uniform_bytes(words: &[u32], doubles: &[f64]) -> Vec<u8> {
    let mut bytes: Vec<u8> = words.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes.extend(doubles.iter().flat_map(|v| v.to_le_bytes()));
    bytes
}

fn filter_masks(force: &ManyParticleForce) -> Result<[u32; 4], RiptideError> {
    let mut masks = [0u32; 4];
    for (role, filter) in force.type_filters().iter().enumerate() {
        for &t in filter {
            if !(0..=MAX_GPU_TYPE_ID).contains(&t) {
                return Err(RiptideError::Configuration(format!(
                    "type id {t} outside GPU bitmask range 0..={MAX_GPU_TYPE_ID}"
                )));
            }
            masks[role] |= 1u32 << t;
        }
    }
    Ok(masks)
}

impl GpuInteractionPipeline {
    /// Allocate buffers and compile the stage shaders for one force
    /// configuration. `potential_wgsl` must define `group_energy_forces`
    /// (see the evaluation template); the box is fixed at build time.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::Configuration`] for type ids outside the
    /// bitmask range or per-particle parameter slices longer than
    /// [`GPU_PARAM_STRIDE`].
    pub fn new(
        gpu: &GpuF64,
        force: &ManyParticleForce,
        potential_wgsl: &str,
        capacity: usize,
        box_vectors: Option<[f64; 3]>,
    ) -> Result<Self, RiptideError> {
        let n = force.num_particles();
        let n_tiles = n.div_ceil(TILE_WIDTH);
        let masks = filter_masks(force)?;

        let mut padded_params = vec![0.0f64; n * GPU_PARAM_STRIDE];
        for i in 0..n {
            let p = force.particle_parameters(i);
            if p.len() > GPU_PARAM_STRIDE {
                return Err(RiptideError::Configuration(format!(
                    "particle {i} carries {} parameters, GPU layout holds {GPU_PARAM_STRIDE}",
                    p.len()
                )));
            }
            padded_params[i * GPU_PARAM_STRIDE..i * GPU_PARAM_STRIDE + p.len()]
                .copy_from_slice(p);
        }
        let types: Vec<u32> = force
            .particle_types()
            .iter()
            .map(|&t| t.max(0) as u32)
            .collect();

        let excl = ExclusionSet::from_pairs(n, force.exclusions());
        // Zero-length storage bindings are invalid; keep one dummy entry.
        let excl_indices: Vec<u32> = if excl.indices().is_empty() {
            vec![0]
        } else {
            excl.indices().to_vec()
        };

        let (use_pbc, bx) = match box_vectors {
            Some(b) => (1u32, b),
            None => (0u32, [0.0; 3]),
        };
        let use_cutoff = match force.method() {
            crate::force::NonbondedMethod::NoCutoff => 0u32,
            _ => 1u32,
        };
        let cutoff_sq = force.cutoff() * force.cutoff();

        let bounds_pipeline = gpu.create_pipeline(shaders::SHADER_TILE_BOUNDS, "tile_bounds");
        let discovery_pipeline =
            gpu.create_pipeline(shaders::SHADER_PAIR_DISCOVERY, "pair_discovery");
        let scan_pipeline = gpu.create_pipeline(shaders::SHADER_PREFIX_SUM, "prefix_sum");
        let scatter_pipeline = gpu.create_pipeline(shaders::SHADER_PAIR_SCATTER, "pair_scatter");
        let evaluate_source =
            shaders::splice_potential(shaders::SHADER_GROUP_EVALUATE_TEMPLATE, potential_wgsl);
        let evaluate_pipeline = gpu.create_pipeline(&evaluate_source, "group_evaluate");

        let bounds_params_buf = gpu.create_uniform_buffer(
            &uniform_bytes(
                &[n as u32, n_tiles as u32, TILE_WIDTH as u32, use_pbc],
                &[bx[0], bx[1], bx[2], 0.0],
            ),
            "bounds_params",
        );
        let discovery_params_buf = gpu.create_uniform_buffer(
            &uniform_bytes(
                &[
                    n as u32,
                    n_tiles as u32,
                    TILE_WIDTH as u32,
                    use_pbc,
                    use_cutoff,
                    capacity as u32,
                    0,
                    0,
                ],
                &[cutoff_sq, bx[0], bx[1], bx[2]],
            ),
            "discovery_params",
        );
        let scan_params_buf =
            gpu.create_uniform_buffer(&uniform_bytes(&[n as u32, 0, 0, 0], &[]), "scan_params");
        // total_pairs patched per invocation after the discovery readback.
        let scatter_params_buf =
            gpu.create_uniform_buffer(&uniform_bytes(&[0, 0, 0, 0], &[]), "scatter_params");
        let evaluate_params_buf = gpu.create_uniform_buffer(
            &uniform_bytes(
                &[
                    n as u32,
                    force.group_size() as u32,
                    use_pbc,
                    use_cutoff,
                    masks[0],
                    masks[1],
                    masks[2],
                    masks[3],
                    u32::from(force.has_type_filters()),
                    0,
                    0,
                    0,
                ],
                &[cutoff_sq, bx[0], bx[1], bx[2]],
            ),
            "evaluate_params",
        );

        Ok(Self {
            n: n as u32,
            n_tiles: n_tiles as u32,
            capacity: capacity as u32,
            box_vectors,
            positions_buf: gpu.create_f64_output_buffer((n * 3).max(1), "positions"),
            centers_buf: gpu.create_f64_output_buffer((n_tiles * 3).max(1), "tile_centers"),
            half_extents_buf: gpu
                .create_f64_output_buffer((n_tiles * 3).max(1), "tile_half_extents"),
            excl_starts_buf: gpu.create_u32_buffer(excl.starts(), "excl_starts"),
            excl_indices_buf: gpu.create_u32_buffer(&excl_indices, "excl_indices"),
            pairs_buf: gpu.create_u32_output_buffer(capacity.max(1) * 2, "pairs"),
            counts_buf: gpu.create_u32_output_buffer(n.max(1), "pair_counts"),
            cursor_buf: gpu.create_u32_output_buffer(1, "pair_cursor"),
            offsets_buf: gpu.create_u32_output_buffer(n + 1, "offsets"),
            cursors_buf: gpu.create_u32_output_buffer(n.max(1), "scatter_cursors"),
            neighbors_buf: gpu.create_u32_output_buffer(capacity.max(1), "neighbors"),
            params_buf: gpu.create_f64_buffer(&padded_params, "particle_params"),
            types_buf: gpu.create_u32_buffer(&types, "particle_types"),
            force_lo_buf: gpu.create_u32_output_buffer((n * 3).max(1), "force_lo"),
            force_hi_buf: gpu.create_u32_output_buffer((n * 3).max(1), "force_hi"),
            energies_buf: gpu.create_f64_output_buffer(n.max(1), "anchor_energies"),
            group_counts_buf: gpu.create_u32_output_buffer(n.max(1), "group_counts"),
            bounds_pipeline,
            discovery_pipeline,
            scan_pipeline,
            scatter_pipeline,
            evaluate_pipeline,
            bounds_params_buf,
            discovery_params_buf,
            scan_params_buf,
            scatter_params_buf,
            evaluate_params_buf,
        })
    }

    /// Run one full invocation over a position snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RiptideError::CapacityExceeded`] when discovery reports
    /// more pairs than the buffer holds (no forces have been written), or
    /// [`RiptideError::GpuCompute`] on readback failure.
    pub fn execute(
        &self,
        gpu: &GpuF64,
        positions: &[f64],
    ) -> Result<GpuEvaluationResult, RiptideError> {
        let n = self.n as usize;
        if positions.len() != n * 3 {
            return Err(RiptideError::Configuration(format!(
                "{} position components for {n} particles",
                positions.len()
            )));
        }
        if n == 0 {
            return Ok(GpuEvaluationResult {
                forces: Vec::new(),
                energy: 0.0,
                pair_count: 0,
                group_count: 0,
            });
        }

        gpu.upload_f64(&self.positions_buf, positions);
        gpu.upload_u32(&self.cursor_buf, &[0]);
        gpu.upload_u32(&self.cursors_buf, &vec![0u32; n]);
        gpu.upload_u32(&self.force_lo_buf, &vec![0u32; n * 3]);
        gpu.upload_u32(&self.force_hi_buf, &vec![0u32; n * 3]);

        // Stage 1-2: bounds + discovery, then the overflow control point.
        let bounds_bg = gpu.create_bind_group(
            &self.bounds_pipeline,
            &[
                &self.bounds_params_buf,
                &self.positions_buf,
                &self.centers_buf,
                &self.half_extents_buf,
            ],
        );
        let discovery_bg = gpu.create_bind_group(
            &self.discovery_pipeline,
            &[
                &self.discovery_params_buf,
                &self.positions_buf,
                &self.centers_buf,
                &self.half_extents_buf,
                &self.excl_starts_buf,
                &self.excl_indices_buf,
                &self.pairs_buf,
                &self.counts_buf,
                &self.cursor_buf,
            ],
        );
        let particle_wgs = self.n.div_ceil(64);
        let mut encoder = gpu.begin_encoder("discovery");
        GpuF64::encode_pass(
            &mut encoder,
            &self.bounds_pipeline,
            &bounds_bg,
            self.n_tiles.div_ceil(64),
        );
        GpuF64::encode_pass(
            &mut encoder,
            &self.discovery_pipeline,
            &discovery_bg,
            particle_wgs,
        );
        gpu.submit_encoder(encoder);

        let total_pairs = gpu.read_back_u32(&self.cursor_buf, 1)?[0];
        if total_pairs > self.capacity {
            return Err(RiptideError::CapacityExceeded {
                required: total_pairs as usize,
                capacity: self.capacity as usize,
            });
        }

        // Stage 3-5: scan, scatter, evaluate in one submission.
        gpu.queue().write_buffer(
            &self.scatter_params_buf,
            0,
            &uniform_bytes(&[total_pairs, 0, 0, 0], &[]),
        );
        let scan_bg = gpu.create_bind_group(
            &self.scan_pipeline,
            &[&self.scan_params_buf, &self.counts_buf, &self.offsets_buf],
        );
        let scatter_bg = gpu.create_bind_group(
            &self.scatter_pipeline,
            &[
                &self.scatter_params_buf,
                &self.pairs_buf,
                &self.offsets_buf,
                &self.cursors_buf,
                &self.neighbors_buf,
            ],
        );
        let evaluate_bg = gpu.create_bind_group(
            &self.evaluate_pipeline,
            &[
                &self.evaluate_params_buf,
                &self.positions_buf,
                &self.params_buf,
                &self.types_buf,
                &self.neighbors_buf,
                &self.offsets_buf,
                &self.excl_starts_buf,
                &self.excl_indices_buf,
                &self.force_lo_buf,
                &self.force_hi_buf,
                &self.energies_buf,
                &self.group_counts_buf,
            ],
        );

        let mut encoder = gpu.begin_encoder("evaluate");
        GpuF64::encode_pass(&mut encoder, &self.scan_pipeline, &scan_bg, 1);
        if total_pairs > 0 {
            GpuF64::encode_pass(
                &mut encoder,
                &self.scatter_pipeline,
                &scatter_bg,
                total_pairs.div_ceil(64),
            );
        }
        GpuF64::encode_pass(&mut encoder, &self.evaluate_pipeline, &evaluate_bg, particle_wgs);
        gpu.submit_encoder(encoder);

        // Control point 2: forces, energies, group counts.
        let lo = gpu.read_back_u32(&self.force_lo_buf, n * 3)?;
        let hi = gpu.read_back_u32(&self.force_hi_buf, n * 3)?;
        let forces: Vec<f64> = lo
            .iter()
            .zip(&hi)
            .map(|(&l, &h)| {
                let raw = ((u64::from(h) << 32) | u64::from(l)) as i64;
                raw as f64 / FORCE_SCALE
            })
            .collect();

        let energies = gpu.read_back_f64(&self.energies_buf, n)?;
        let energy = energies.iter().sum();
        let group_count = gpu
            .read_back_u32(&self.group_counts_buf, n)?
            .iter()
            .map(|&c| u64::from(c))
            .sum();

        Ok(GpuEvaluationResult {
            forces,
            energy,
            pair_count: total_pairs as usize,
            group_count,
        })
    }

    /// Box vectors the pipeline was built with.
    #[must_use]
    pub const fn box_vectors(&self) -> Option<[f64; 3]> {
        self.box_vectors
    }
}
