//! GPU colony engine, built on `wgpu`.
//!
//! Responsibilities mirror the reference OpenCL back-end one for one:
//! device discovery (prefer a high-performance adapter), shader module
//! build, typed buffer creation, uniform dispatch, and synchronous
//! completion before the host reads results back. `pollster` blocks on the
//! otherwise-async adapter/device request and queue submission; `bytemuck`
//! casts the `#[repr(C)]` uniform structs to the raw bytes wgpu buffers
//! expect.
//!
//! The advance phase launches one compute-shader invocation per ant
//! (`shaders/advance.wgsl`, a `manyant`-style layout); the update phase is a
//! separate per-`(i, j)` kernel (`shaders/update.wgsl`), matching the
//! reference's `constant` variant, which keeps reinforcement as its own
//! dispatch rather than folding it into tour construction.
//!
//! The dependency bitmask's word width is picked per device: adapters that
//! expose `Features::SHADER_INT64` get the 64-bit packing from
//! [`crate::eligibility::WordWidth::W64`] (half the words per row), anything
//! else falls back to 32-bit packing. WGSL has no portable native `u64`, so
//! either width is uploaded as `u32` lanes ([`pack_bitmask_lanes`]) and the
//! shader's `discharge` resolves lane and bit-within-lane from
//! `bits_per_word`/`lanes_per_word` rather than assuming one lane per word.

use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::eligibility::{DependencyBitmask, Orientation, WordWidth};
use crate::engine::ColonyEngine;
use crate::error::EngineError;
use crate::params::AntParams;
use crate::problem::Problem;
use crate::profiler::Profiler;
use crate::rng::Minstd0;

const ADVANCE_SHADER: &str = include_str!("shaders/advance.wgsl");
const UPDATE_SHADER: &str = include_str!("shaders/update.wgsl");
const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct AdvanceParams {
    n: u32,
    words_per_row: u32,
    bits_per_word: u32,
    lanes_per_word: u32,
    alpha: f32,
    _pad: [u32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct UpdateParams {
    n: u32,
    best_route_len: u32,
    rho: f32,
    min_pheromone: f32,
    max_pheromone: f32,
    spread: f32,
    has_best: u32,
    _pad: u32,
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    advance_pipeline: wgpu::ComputePipeline,
    update_pipeline: wgpu::ComputePipeline,
}

pub struct GpuEngine {
    ctx: Option<GpuContext>,
    n: usize,
    words_per_row: usize,
    bits_per_word: u32,
    lanes_per_word: u32,

    pheromone_buf: Option<wgpu::Buffer>,
    visibility_buf: Option<wgpu::Buffer>,
    weights_buf: Option<wgpu::Buffer>,
    dependency_buf: Option<wgpu::Buffer>,
    allowed_buf: Option<wgpu::Buffer>,
    allowed_prototype: Vec<i32>,
    routes_buf: Option<wgpu::Buffer>,
    route_lengths_buf: Option<wgpu::Buffer>,
    rng_state_buf: Option<wgpu::Buffer>,
    best_route_buf: Option<wgpu::Buffer>,

    params: Option<AntParams>,
    best_route: Vec<usize>,
    best_route_length: i32,
    prepared: bool,
}

impl Default for GpuEngine {
    fn default() -> Self {
        GpuEngine {
            ctx: None,
            n: 0,
            words_per_row: 0,
            bits_per_word: 32,
            lanes_per_word: 1,
            pheromone_buf: None,
            visibility_buf: None,
            weights_buf: None,
            dependency_buf: None,
            allowed_buf: None,
            allowed_prototype: Vec::new(),
            routes_buf: None,
            route_lengths_buf: None,
            rng_state_buf: None,
            best_route_buf: None,
            params: None,
            best_route: Vec::new(),
            best_route_length: i32::MAX,
            prepared: false,
        }
    }
}

impl GpuEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn init_context() -> Result<GpuContext, EngineError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EngineError::BackendUnavailable("gpu".to_string()))?;

        let optional_features = adapter.features() & wgpu::Features::SHADER_INT64;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("colony-gpu-device"),
                required_features: optional_features,
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| EngineError::Gpu(e.to_string()))?;

        let advance_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("advance"),
            source: wgpu::ShaderSource::Wgsl(ADVANCE_SHADER.into()),
        });
        let update_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("update"),
            source: wgpu::ShaderSource::Wgsl(UPDATE_SHADER.into()),
        });

        let advance_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("advance-pipeline"),
            layout: None,
            module: &advance_module,
            entry_point: Some("advance"),
            compilation_options: Default::default(),
            cache: None,
        });
        let update_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("update-pipeline"),
            layout: None,
            module: &update_module,
            entry_point: Some("update"),
            compilation_options: Default::default(),
            cache: None,
        });

        info!("GPU backend initialized on adapter '{}'", adapter.get_info().name);

        Ok(GpuContext {
            device,
            queue,
            advance_pipeline,
            update_pipeline,
        })
    }

    fn dispatch_advance(&mut self) {
        let ctx = self.ctx.as_ref().expect("prepared");
        let n = self.n as u32;
        let groups = (n + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

        let advance_params = AdvanceParams {
            n,
            words_per_row: self.words_per_row as u32,
            bits_per_word: self.bits_per_word,
            lanes_per_word: self.lanes_per_word,
            alpha: self.params.as_ref().unwrap().alpha as f32,
            _pad: [0; 3],
        };
        let params_buf = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("advance-params"),
            contents: bytemuck::bytes_of(&advance_params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let layout = ctx.advance_pipeline.get_bind_group_layout(0);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("advance-bind-group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.pheromone_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.visibility_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.weights_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.dependency_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.allowed_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: self.routes_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: self.route_lengths_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: self.rng_state_buf.as_ref().unwrap().as_entire_binding(),
                },
            ],
        });

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("advance-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("advance-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&ctx.advance_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        ctx.device.poll(wgpu::Maintain::Wait);
    }

    fn reset_allowed(&mut self) {
        let ctx = self.ctx.as_ref().expect("prepared");
        let n = self.n;
        let mut flattened = Vec::with_capacity(n * n);
        for _ in 0..n {
            flattened.extend_from_slice(&self.allowed_prototype);
        }
        ctx.queue.write_buffer(
            self.allowed_buf.as_ref().unwrap(),
            0,
            bytemuck::cast_slice(&flattened),
        );
    }

    fn read_routes_and_lengths(&self) -> (Vec<Vec<u32>>, Vec<i32>) {
        let ctx = self.ctx.as_ref().expect("prepared");
        let n = self.n;

        let routes_flat: Vec<u32> = read_buffer(ctx, self.routes_buf.as_ref().unwrap(), n * n);
        let lengths: Vec<i32> = read_buffer(ctx, self.route_lengths_buf.as_ref().unwrap(), n);

        let routes = routes_flat.chunks(n).map(|c| c.to_vec()).collect();
        (routes, lengths)
    }

    fn dispatch_update(&mut self, best_route: &[u32], spread: f32, has_best: bool) {
        let ctx = self.ctx.as_ref().expect("prepared");
        let n = self.n as u32;
        let params = self.params.as_ref().unwrap();

        let dummy = [0u32; 1];
        let route_contents: &[u32] = if best_route.is_empty() { &dummy } else { best_route };
        let best_route_buf = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("best-route"),
            contents: bytemuck::cast_slice(route_contents),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let update_params = UpdateParams {
            n,
            best_route_len: best_route.len() as u32,
            rho: params.rho as f32,
            min_pheromone: params.min_pheromone as f32,
            max_pheromone: params.max_pheromone as f32,
            spread,
            has_best: has_best as u32,
            _pad: 0,
        };
        let params_buf = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("update-params"),
            contents: bytemuck::bytes_of(&update_params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let layout = ctx.update_pipeline.get_bind_group_layout(0);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("update-bind-group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.pheromone_buf.as_ref().unwrap().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: best_route_buf.as_entire_binding(),
                },
            ],
        });

        let total = n * n;
        let groups = (total + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("update-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("update-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&ctx.update_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        ctx.device.poll(wgpu::Maintain::Wait);
    }
}

/// Picks the dependency-bitmask word width for `device`: 64-bit packing
/// halves `words_per_row` (fewer iterations in `discharge`'s inner loop) but
/// is only worth addressing when the adapter actually exposes native 64-bit
/// shader integers; everything else falls back to the universally-supported
/// 32-bit packing.
fn select_word_width(device: &wgpu::Device) -> WordWidth {
    if device.features().contains(wgpu::Features::SHADER_INT64) {
        WordWidth::W64
    } else {
        WordWidth::W32
    }
}

fn bits_per_word(width: WordWidth) -> u32 {
    match width {
        WordWidth::W32 => 32,
        WordWidth::W64 => 64,
    }
}

/// How many `u32` storage-buffer lanes one logical word occupies. WGSL has
/// no portable native `u64`, so a 64-bit word is still uploaded as two `u32`
/// lanes (low half, then high half); the shader's `discharge` computes which
/// lane and which bit within that lane to test from `bits_per_word` and
/// `lanes_per_word` rather than assuming one lane per word.
fn lanes_per_word(width: WordWidth) -> u32 {
    match width {
        WordWidth::W32 => 1,
        WordWidth::W64 => 2,
    }
}

fn pack_bitmask_lanes(bitmask: &DependencyBitmask) -> Vec<u32> {
    let lanes = lanes_per_word(bitmask.width);
    let mut out = Vec::with_capacity(bitmask.words.len() * lanes as usize);
    for &word in &bitmask.words {
        out.push(word as u32);
        if lanes == 2 {
            out.push((word >> 32) as u32);
        }
    }
    out
}

fn read_buffer<T: Pod>(ctx: &GpuContext, buffer: &wgpu::Buffer, count: usize) -> Vec<T> {
    let byte_size = (count * std::mem::size_of::<T>()) as u64;
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staging"),
        size: byte_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback-encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, byte_size);
    ctx.queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("map_async callback dropped")
        .expect("buffer map failed");

    let data = slice.get_mapped_range();
    let result = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();
    result
}

impl ColonyEngine for GpuEngine {
    fn prepare(&mut self, problem: &Problem, params: &AntParams) -> Result<(), EngineError> {
        params.validate()?;
        let ctx = Self::init_context()?;
        let n = problem.size();

        let pheromone = vec![params.initial_pheromone as f32; n * n];
        let visibility: Vec<f32> = problem
            .visibility(params.zero_weight, params.beta)
            .into_iter()
            .map(|v| v as f32)
            .collect();
        let mut weights = vec![0i32; n * n];
        for i in 0..n {
            for j in 0..n {
                weights[i * n + j] = problem.weight(i, j);
            }
        }
        let width = select_word_width(&ctx.device);
        let bitmask = DependencyBitmask::build(problem, Orientation::Predecessors, width);
        let words_per_row = bitmask.words_per_row;
        let dependency_words = pack_bitmask_lanes(&bitmask);

        let allowed_prototype = problem.predecessor_counts();
        let mut host_rng = Minstd0::new(params.random_seed);
        let rng_seeds: Vec<u32> = (0..n).map(|_| host_rng.fork()).collect();

        let make_storage = |label: &str, contents: &[u8], read_only: bool| {
            ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: if read_only {
                    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST
                } else {
                    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC
                },
            })
        };

        self.pheromone_buf = Some(make_storage("pheromone", bytemuck::cast_slice(&pheromone), false));
        self.visibility_buf = Some(make_storage("visibility", bytemuck::cast_slice(&visibility), true));
        self.weights_buf = Some(make_storage("weights", bytemuck::cast_slice(&weights), true));
        self.dependency_buf = Some(make_storage(
            "dependency-mask",
            bytemuck::cast_slice(&dependency_words),
            true,
        ));
        let mut flattened_allowed = Vec::with_capacity(n * n);
        for _ in 0..n {
            flattened_allowed.extend_from_slice(&allowed_prototype);
        }
        self.allowed_buf = Some(make_storage("allowed", bytemuck::cast_slice(&flattened_allowed), false));
        self.routes_buf = Some(make_storage("routes", bytemuck::cast_slice(&vec![0u32; n * n]), false));
        self.route_lengths_buf = Some(make_storage(
            "route-lengths",
            bytemuck::cast_slice(&vec![0i32; n]),
            false,
        ));
        self.rng_state_buf = Some(make_storage("rng-state", bytemuck::cast_slice(&rng_seeds), false));

        self.ctx = Some(ctx);
        self.n = n;
        self.words_per_row = words_per_row;
        self.bits_per_word = bits_per_word(width);
        self.lanes_per_word = lanes_per_word(width);
        self.allowed_prototype = allowed_prototype;
        self.params = Some(params.clone());
        self.best_route = Vec::new();
        self.best_route_length = i32::MAX;
        self.prepared = true;
        Ok(())
    }

    fn optimize(&mut self, rounds: usize, profiler: &mut Profiler) -> Result<(), EngineError> {
        if !self.prepared {
            return Err(EngineError::NotPrepared);
        }

        for _round in 0..rounds {
            profiler.start("opts");

            profiler.start("adva");
            self.reset_allowed();
            self.dispatch_advance();
            profiler.stop("adva");

            profiler.start("eval");
            let (routes, lengths) = self.read_routes_and_lengths();
            let mut best_idx = None;
            let mut best_len = i32::MAX;
            for (i, &len) in lengths.iter().enumerate() {
                if len < best_len {
                    best_len = len;
                    best_idx = Some(i);
                }
            }
            profiler.stop("eval");

            let stuck = lengths.iter().filter(|&&l| l == i32::MAX).count();
            if stuck > 0 {
                debug!("{stuck} ant(s) stuck this round on the GPU backend");
            }

            profiler.start("upda");
            let params = self.params.as_ref().unwrap().clone();
            if let Some(idx) = best_idx {
                if best_len < self.best_route_length {
                    self.best_route_length = best_len;
                    self.best_route = routes[idx].iter().map(|&v| v as usize).collect();
                }
                let spread = (params.q / best_len as f64) as f32;
                self.dispatch_update(&routes[idx], spread, true);
            } else {
                self.dispatch_update(&[], 0.0, false);
            }
            profiler.stop("upda");

            profiler.stop("opts");
        }

        Ok(())
    }

    fn best_route_length(&self) -> i32 {
        self.best_route_length
    }

    fn best_route(&self) -> &[usize] {
        &self.best_route
    }
}
