//! The hierarchy driver and the public renderer API.
//!
//! A render walks a ladder of tile stages. Each stage evaluates its
//! candidate tiles in parallel with interval arithmetic, resolves tiles
//! that are provably inside or outside the shape, and compacts the
//! ambiguous survivors, each carrying a tape freshly specialized to its
//! region. Survivors are subdivided into the next stage's candidates.
//! After the last stage, per-pixel float evaluation fills the depth image
//! and, for 3D, a derivative pass renders surface normals.
//!
//! Workers are straight-line and independent; all cross-worker
//! communication goes through the subtape pool's claim cursor, the
//! compaction cursors and the depth/normal planes, all of which are
//! atomic. The `thread::scope` join between launches is the stage barrier.

use crate::deriv::Pack2;
use crate::error::Error;
use crate::eval::TapeView;
use crate::eval::deriv::{eval_deriv, pack_normal};
use crate::eval::float::{eval_pack2, eval_scalar};
use crate::eval::interval::{IntervalScratch, Specialized, eval_interval, specialize};
use crate::grid::{Dimension, MaskGrid, TilePos, upsample_occluder};
use crate::interval::Interval;
use crate::pixmap::{Plane, Surface, blit, encode_png};
use crate::subtape::SubtapePool;
use crate::tape::Tape;
use log::{debug, warn};
use nalgebra::{Matrix4, Vector4};
use relief_tree::{NodeId, Tree};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed};
use std::thread;

/// Tiles are handed to workers in blocks of this many.
const BLOCK: usize = 16;

/// Largest supported image side, bounded by the packed tile position.
const MAX_IMAGE_SIZE: u32 = 4096;

/// Camera of a render: a uniform scale and world-space center, optionally
/// replaced by a full 4x4 transform with projective divide.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Half-extent of the rendered region in world units.
    pub scale: f32,
    /// World-space center of the rendered region. In 2D renders the Z
    /// variable is bound to `center[2]`, so the output is independent of Z.
    pub center: [f32; 3],
    /// Full 4x4 transform from normalized device coordinates to world
    /// space. When set, `scale` and the X/Y components of `center` are
    /// ignored.
    pub transform: Option<Matrix4<f32>>,
}

impl Default for View {
    fn default() -> Self {
        Self {
            scale: 1.0,
            center: [0.0; 3],
            transform: None,
        }
    }
}

impl View {
    /// Map a normalized device coordinate (components in [-1, 1]) to world
    /// space.
    fn map_point(&self, n: [f32; 3]) -> [f32; 3] {
        match &self.transform {
            Some(m) => {
                let p = m * Vector4::new(n[0], n[1], n[2], 1.0);
                [p.x / p.w, p.y / p.w, p.z / p.w]
            }
            None => [
                self.center[0] + self.scale * n[0],
                self.center[1] + self.scale * n[1],
                self.center[2] + self.scale * n[2],
            ],
        }
    }
}

/// Tunables of a renderer instance.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Number of parallel worker streams.
    pub threads: usize,
    /// Capacity of the shared subtape pool, in chunks.
    pub pool_capacity: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            threads: 4,
            pool_capacity: 65536,
        }
    }
}

/// Tallies from the most recent render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Candidate tiles entering each stage.
    pub tiles_in: Vec<usize>,
    /// Tiles proven fully inside per stage.
    pub filled: Vec<usize>,
    /// Tiles proven fully outside per stage.
    pub empty: Vec<usize>,
    /// Tiles culled by the depth masks per stage (3D only).
    pub masked: Vec<usize>,
    /// Ambiguous tiles surviving into the next stage.
    pub ambiguous: Vec<usize>,
    /// Subtape chunks claimed over the whole render.
    pub chunks_used: usize,
    /// Specializations abandoned because the pool ran dry.
    pub pool_exhausted: usize,
}

/// A candidate tile: its grid position, the subtape chain that specializes
/// the shape to its region (0 = the root tape) and whether that tape is
/// terminal.
#[derive(Debug, Clone, Copy)]
struct Tile {
    pos: TilePos,
    handle: u32,
    terminal: bool,
}

impl Tile {
    fn encode(self) -> u64 {
        u64::from(self.pos.bits())
            | (u64::from(self.handle) << 32)
            | (u64::from(self.terminal) << 63)
    }

    fn decode(bits: u64) -> Self {
        Self {
            pos: TilePos::from_bits(bits as u32),
            handle: ((bits >> 32) & 0x7FFF_FFFF) as u32,
            terminal: bits >> 63 != 0,
        }
    }
}

/// Compacted output array shared by a stage's workers. Each worker reserves
/// a contiguous range with one `fetch_add` per flush, so the relative order
/// of a worker's tiles is preserved.
struct TileList {
    slots: Box<[AtomicU64]>,
    len: AtomicUsize,
}

impl TileList {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            len: AtomicUsize::new(0),
        }
    }

    fn extend(&self, tiles: &[u64]) {
        let at = self.len.fetch_add(tiles.len(), Relaxed);
        for (i, t) in tiles.iter().enumerate() {
            self.slots[at + i].store(*t, Relaxed);
        }
    }

    fn snapshot(&self) -> Vec<u64> {
        let len = self.len.load(Relaxed);
        self.slots[..len].iter().map(|s| s.load(Relaxed)).collect()
    }
}

/// Static configuration of one subdivision level.
struct Level {
    tile_size: u32,
    tiles_per_side: u32,
    /// Filled-tile record: max top-Z per tile column.
    mask: MaskGrid,
}

/// A renderer bound to one compiled shape.
///
/// The renderer owns the tape, the subtape pool and both image planes for
/// its lifetime; every [`Renderer::run`] resets them, so rendering the same
/// view twice produces bit-identical output.
pub struct Renderer {
    tape: Tape,
    dim: Dimension,
    /// Working image side, aligned up to a multiple of the coarsest tile.
    size: u32,
    /// Side length the caller asked for; readback crops to it.
    orig_size: u32,
    settings: RenderSettings,
    pool: SubtapePool,
    levels: Vec<Level>,
    depth: Plane,
    normal: Plane,
    stats: RenderStats,
}

impl Renderer {
    /// Compile `root` and set up a renderer producing square images of the
    /// given side length (at most 4096 px).
    pub fn build(
        tree: &Tree,
        root: NodeId,
        image_size_px: u32,
        dim: Dimension,
    ) -> Result<Self, Error> {
        Self::with_settings(tree, root, image_size_px, dim, RenderSettings::default())
    }

    /// [`Renderer::build`] with explicit settings.
    pub fn with_settings(
        tree: &Tree,
        root: NodeId,
        image_size_px: u32,
        dim: Dimension,
        settings: RenderSettings,
    ) -> Result<Self, Error> {
        assert!(
            image_size_px > 0 && image_size_px <= MAX_IMAGE_SIZE,
            "image size must be in 1..={MAX_IMAGE_SIZE}"
        );

        let tape = Tape::compile(tree, root)?;

        let coarsest = dim.stages()[0];
        let size = image_size_px.div_ceil(coarsest) * coarsest;

        let levels = dim
            .stages()
            .iter()
            .map(|&tile_size| Level {
                tile_size,
                tiles_per_side: size / tile_size,
                mask: MaskGrid::new(size / tile_size),
            })
            .collect();

        let threads = settings.threads.max(1);
        let pool_capacity = settings.pool_capacity.clamp(2, 1 << 31);

        Ok(Self {
            tape,
            dim,
            size,
            orig_size: image_size_px,
            settings: RenderSettings {
                threads,
                pool_capacity,
            },
            pool: SubtapePool::new(pool_capacity),
            levels,
            depth: Plane::new(size),
            normal: Plane::new(size),
            stats: RenderStats::default(),
        })
    }

    /// Render the shape under the given view into the internal planes.
    ///
    /// Idempotent: the pool, the per-level masks and both planes are reset
    /// on entry.
    pub fn run(&mut self, view: &View) -> Result<(), Error> {
        self.pool.reset();
        self.depth.clear();
        self.normal.clear();
        for level in &self.levels {
            level.mask.clear();
        }

        let mut stats = RenderStats::default();

        // Stage 0 candidates: every tile of the coarsest grid, all bound to
        // the root tape.
        let tps0 = self.levels[0].tiles_per_side;
        let tile_count = match self.dim {
            Dimension::Two => (tps0 * tps0) as usize,
            Dimension::Three => (tps0 * tps0 * tps0) as usize,
        };
        let root_terminal = self.tape.is_terminal();
        let mut queue: Vec<u64> = (0..tile_count)
            .map(|i| {
                Tile {
                    pos: TilePos::from_linear(i, tps0, self.dim),
                    handle: 0,
                    terminal: root_terminal,
                }
                .encode()
            })
            .collect();

        let mut occluder = vec![0u32; (tps0 * tps0) as usize];
        let mut filled_records: Vec<Vec<u64>> = Vec::new();
        let mut final_survivors: Vec<u64> = Vec::new();

        for k in 0..self.levels.len() {
            if k > 0 && self.dim.is_3d() {
                occluder = upsample_occluder(
                    &occluder,
                    &self.levels[k - 1].mask,
                    self.levels[k].tiles_per_side,
                );
            }

            stats.tiles_in.push(queue.len());
            let (survivors, filled, counts) = self.interval_stage(view, k, &queue, &occluder)?;

            debug!(
                "stage {k}: {} tiles, {} filled, {} empty, {} masked, {} ambiguous",
                queue.len(),
                counts[0],
                counts[1],
                counts[2],
                survivors.len(),
            );
            stats.filled.push(counts[0]);
            stats.empty.push(counts[1]);
            stats.masked.push(counts[2]);
            stats.ambiguous.push(survivors.len());
            filled_records.push(filled);

            if k + 1 < self.levels.len() {
                queue = self.materialize_children(&survivors, k);
            } else {
                final_survivors = survivors;
            }
        }

        // Filled tiles reach the image before per-pixel work so that the
        // depth early-out sees them.
        self.composite_masks();
        self.pixel_stage(view, &final_survivors)?;
        if self.dim.is_3d() {
            self.normal_stage(view, &filled_records, &final_survivors)?;
        }

        stats.chunks_used = self.pool.used();
        stats.pool_exhausted = self.pool.exhausted_count();
        if stats.pool_exhausted > 0 {
            warn!(
                "subtape pool exhausted; {} tiles fell back to their parent tape",
                stats.pool_exhausted
            );
        }

        self.stats = stats;
        Ok(())
    }

    /// Evaluate one stage's candidates in parallel. Returns the compacted
    /// survivors, the filled-tile records and the [filled, empty, masked]
    /// counts.
    fn interval_stage(
        &self,
        view: &View,
        k: usize,
        queue: &[u64],
        occluder: &[u32],
    ) -> Result<(Vec<u64>, Vec<u64>, [usize; 3]), Error> {
        let level = &self.levels[k];
        let survivors = TileList::new(queue.len());
        let filled = TileList::new(queue.len());
        let filled_count = AtomicUsize::new(0);
        let empty_count = AtomicUsize::new(0);
        let masked_count = AtomicUsize::new(0);
        let cursor = AtomicUsize::new(0);

        let tape = &self.tape;
        let pool = &self.pool;
        let dim = self.dim;
        let size = self.size;

        self.spawn_workers(|| {
            let mut scratch = IntervalScratch::new();
            let mut local_survivors = Vec::new();
            let mut local_filled = Vec::new();
            let mut local_counts = [0usize; 3];

            loop {
                let base = cursor.fetch_add(BLOCK, Relaxed);
                if base >= queue.len() {
                    break;
                }
                for bits in &queue[base..(base + BLOCK).min(queue.len())] {
                    let tile = Tile::decode(*bits);
                    let pos = tile.pos;

                    // Top voxel of the tile, which is also the depth a
                    // filled tile contributes.
                    let z_top = (pos.z() + 1) * level.tile_size - 1;

                    if dim.is_3d() {
                        let col = (pos.y() * level.tiles_per_side + pos.x()) as usize;
                        if occluder[col] >= z_top {
                            local_counts[2] += 1;
                            continue;
                        }
                    }

                    let [xi, yi, zi] = tile_bounds(view, dim, size, level.tile_size, pos);
                    let parent = TapeView::new(tape, tile.handle);
                    let r = eval_interval(&parent, pool, xi, yi, zi, &mut scratch);

                    if r.upper() < 0.0 {
                        let mask_value = match dim {
                            Dimension::Two => u32::MAX,
                            Dimension::Three => z_top,
                        };
                        level.mask.fetch_max(pos.x(), pos.y(), mask_value);
                        local_filled.push(*bits);
                        local_counts[0] += 1;
                    } else if r.lower() > 0.0 {
                        local_counts[1] += 1;
                    } else {
                        let (handle, terminal) = if tile.terminal {
                            // A terminal tape cannot be specialized further;
                            // reuse it verbatim.
                            (tile.handle, true)
                        } else {
                            match specialize(&parent, pool, &mut scratch) {
                                Specialized::Chain { handle, terminal } => (handle, terminal),
                                Specialized::Exhausted => (tile.handle, false),
                            }
                        };
                        local_survivors.push(
                            Tile {
                                pos,
                                handle,
                                terminal,
                            }
                            .encode(),
                        );
                    }
                }
            }

            survivors.extend(&local_survivors);
            filled.extend(&local_filled);
            filled_count.fetch_add(local_counts[0], Relaxed);
            empty_count.fetch_add(local_counts[1], Relaxed);
            masked_count.fetch_add(local_counts[2], Relaxed);
        })?;

        Ok((
            survivors.snapshot(),
            filled.snapshot(),
            [
                filled_count.load(Relaxed),
                empty_count.load(Relaxed),
                masked_count.load(Relaxed),
            ],
        ))
    }

    /// Subdivide each survivor of stage `k` into its children at stage
    /// `k + 1`; children inherit the parent's subtape handle.
    fn materialize_children(&self, survivors: &[u64], k: usize) -> Vec<u64> {
        let ratio = self.levels[k].tile_size / self.levels[k + 1].tile_size;
        let z_ratio = if self.dim.is_3d() { ratio } else { 1 };

        let mut queue =
            Vec::with_capacity(survivors.len() * (ratio * ratio * z_ratio) as usize);
        for bits in survivors {
            let t = Tile::decode(*bits);
            for dz in 0..z_ratio {
                for dy in 0..ratio {
                    for dx in 0..ratio {
                        queue.push(
                            Tile {
                                pos: TilePos::new(
                                    t.pos.x() * ratio + dx,
                                    t.pos.y() * ratio + dy,
                                    t.pos.z() * z_ratio + dz,
                                ),
                                handle: t.handle,
                                terminal: t.terminal,
                            }
                            .encode(),
                        );
                    }
                }
            }
        }

        queue
    }

    /// Copy every level's filled mask into the depth image.
    fn composite_masks(&self) {
        for level in &self.levels {
            for ty in 0..level.tiles_per_side {
                for tx in 0..level.tiles_per_side {
                    let v = level.mask.get(tx, ty);
                    if v == 0 {
                        continue;
                    }
                    for py in ty * level.tile_size..(ty + 1) * level.tile_size {
                        for px in tx * level.tile_size..(tx + 1) * level.tile_size {
                            self.depth.fetch_max(px, py, v);
                        }
                    }
                }
            }
        }
    }

    /// Per-pixel float evaluation over the finest surviving tiles.
    fn pixel_stage(&self, view: &View, survivors: &[u64]) -> Result<(), Error> {
        let level = self.levels.last().expect("at least one level");
        let ts = level.tile_size;
        let cursor = AtomicUsize::new(0);

        let tape = &self.tape;
        let pool = &self.pool;
        let depth = &self.depth;
        let dim = self.dim;
        let size = self.size;

        self.spawn_workers(|| {
            let mut regs = Vec::new();
            let mut regs2 = Vec::new();

            loop {
                let base = cursor.fetch_add(BLOCK, Relaxed);
                if base >= survivors.len() {
                    break;
                }
                for bits in &survivors[base..(base + BLOCK).min(survivors.len())] {
                    let tile = Tile::decode(*bits);
                    let tape_view = TapeView::new(tape, tile.handle);
                    let (x0, y0) = (tile.pos.x() * ts, tile.pos.y() * ts);

                    for py in y0..y0 + ts {
                        for px in x0..x0 + ts {
                            match dim {
                                Dimension::Two => {
                                    let [wx, wy, _] = pixel_world_2d(view, size, px, py);
                                    let v = eval_scalar(
                                        &tape_view,
                                        pool,
                                        wx,
                                        wy,
                                        view.center[2],
                                        &mut regs,
                                    );
                                    if v < 0.0 {
                                        depth.fetch_max(px, py, u32::MAX);
                                    }
                                }
                                Dimension::Three => {
                                    let z0 = i64::from(tile.pos.z() * ts);
                                    let mut z = z0 + i64::from(ts) - 1;
                                    while z >= z0 {
                                        // Deeper voxels cannot beat a depth
                                        // that is already at or above us.
                                        if i64::from(depth.get(px, py)) >= z {
                                            break;
                                        }

                                        let a = voxel_world(view, size, px, py, z as u32);
                                        let b = voxel_world(
                                            view,
                                            size,
                                            px,
                                            py,
                                            (z - 1).max(0) as u32,
                                        );
                                        let v = eval_pack2(
                                            &tape_view,
                                            pool,
                                            Pack2::new(a[0], b[0]),
                                            Pack2::new(a[1], b[1]),
                                            Pack2::new(a[2], b[2]),
                                            &mut regs2,
                                        );

                                        if v.lane(0) < 0.0 {
                                            depth.fetch_max(px, py, z as u32);
                                            break;
                                        }
                                        if z - 1 >= z0 && v.lane(1) < 0.0 {
                                            depth.fetch_max(px, py, (z - 1) as u32);
                                            break;
                                        }
                                        z -= 2;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    /// Derivative pass over every surface pixel, using the finest tape that
    /// covered the surface voxel: filled tiles own their top Z, ambiguous
    /// last-stage tiles own their Z span.
    fn normal_stage(
        &self,
        view: &View,
        filled_records: &[Vec<u64>],
        survivors: &[u64],
    ) -> Result<(), Error> {
        struct Job {
            pos: TilePos,
            handle: u32,
            tile_size: u32,
            z_lo: u32,
            z_hi: u32,
        }

        let mut jobs = Vec::new();
        for (level, records) in self.levels.iter().zip(filled_records) {
            for bits in records {
                let t = Tile::decode(*bits);
                let z_top = (t.pos.z() + 1) * level.tile_size - 1;
                jobs.push(Job {
                    pos: t.pos,
                    handle: t.handle,
                    tile_size: level.tile_size,
                    z_lo: z_top,
                    z_hi: z_top,
                });
            }
        }
        let finest = self.levels.last().expect("at least one level");
        for bits in survivors {
            let t = Tile::decode(*bits);
            let z_lo = t.pos.z() * finest.tile_size;
            jobs.push(Job {
                pos: t.pos,
                handle: t.handle,
                tile_size: finest.tile_size,
                z_lo,
                z_hi: z_lo + finest.tile_size - 1,
            });
        }

        let cursor = AtomicUsize::new(0);
        let tape = &self.tape;
        let pool = &self.pool;
        let depth = &self.depth;
        let normal = &self.normal;
        let size = self.size;

        self.spawn_workers(|| {
            let mut regs = Vec::new();

            loop {
                let base = cursor.fetch_add(BLOCK, Relaxed);
                if base >= jobs.len() {
                    break;
                }
                for job in &jobs[base..(base + BLOCK).min(jobs.len())] {
                    let tape_view = TapeView::new(tape, job.handle);
                    let (x0, y0) = (job.pos.x() * job.tile_size, job.pos.y() * job.tile_size);

                    for py in y0..y0 + job.tile_size {
                        for px in x0..x0 + job.tile_size {
                            let d = depth.get(px, py);
                            if d == 0 || d < job.z_lo || d > job.z_hi {
                                continue;
                            }

                            // Sample the gradient one voxel above the
                            // surface.
                            let zv = (d + 1).min(size - 1);
                            let [wx, wy, wz] = voxel_world(view, size, px, py, zv);
                            let g = eval_deriv(&tape_view, pool, wx, wy, wz, &mut regs);
                            normal.fetch_max(px, py, pack_normal(g));
                        }
                    }
                }
            }
        })
    }

    /// Launch the configured worker streams and join them.
    fn spawn_workers<F: Fn() + Sync>(&self, worker: F) -> Result<(), Error> {
        thread::scope(|s| {
            let mut handles = Vec::with_capacity(self.settings.threads);
            for i in 0..self.settings.threads {
                let handle = thread::Builder::new()
                    .name(format!("relief-{i}"))
                    .spawn_scoped(s, &worker)
                    .map_err(Error::Device)?;
                handles.push(handle);
            }
            for handle in handles {
                if let Err(payload) = handle.join() {
                    std::panic::resume_unwind(payload);
                }
            }
            Ok(())
        })
    }

    /// The image side length readbacks use.
    pub fn image_size(&self) -> u32 {
        self.orig_size
    }

    /// Dimensionality of this renderer.
    pub fn dimension(&self) -> Dimension {
        self.dim
    }

    /// Depth sample at a pixel: the highest inside-voxel Z in 3D, or a
    /// nonzero fill sentinel in 2D.
    pub fn height_at(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.orig_size && y < self.orig_size);
        self.depth.get(x, y)
    }

    /// Snapshot of the depth image, row-major.
    pub fn depth_data(&self) -> Vec<u32> {
        self.depth.snapshot(self.orig_size)
    }

    /// Snapshot of the packed normal image, row-major.
    pub fn normal_data(&self) -> Vec<u32> {
        self.normal.snapshot(self.orig_size)
    }

    /// Copy a surface into a square host buffer of side `target_size_px`,
    /// scaling nearest-neighbor. In append mode destination samples are
    /// preserved wherever the renderer has no coverage.
    pub fn copy_surface(
        &self,
        dst: &mut [u32],
        target_size_px: u32,
        surface: Surface,
        append: bool,
    ) {
        let src = match surface {
            Surface::Depth => self.depth_data(),
            Surface::Normal => self.normal_data(),
        };
        blit(&src, self.orig_size, dst, target_size_px, append);
    }

    /// Encode a surface as a PNG.
    pub fn to_png(&self, surface: Surface) -> Vec<u8> {
        let data = match surface {
            Surface::Depth => self.depth_data(),
            Surface::Normal => self.normal_data(),
        };
        encode_png(&data, self.orig_size, surface)
    }

    /// Tallies from the most recent render.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }
}

/// World-space bounds of a tile, from its mapped corners.
fn tile_bounds(
    view: &View,
    dim: Dimension,
    size: u32,
    tile_size: u32,
    pos: TilePos,
) -> [Interval; 3] {
    let norm = |c: u32| 2.0 * (c as f32) / (size as f32) - 1.0;
    let (x0, y0, z0) = (
        pos.x() * tile_size,
        pos.y() * tile_size,
        pos.z() * tile_size,
    );

    let mut corners: SmallVec<[[f32; 3]; 8]> = SmallVec::new();
    let z_steps = if dim.is_3d() { 2 } else { 1 };
    for dz in 0..z_steps {
        for dy in 0..2 {
            for dx in 0..2 {
                corners.push(view.map_point([
                    norm(x0 + dx * tile_size),
                    norm(y0 + dy * tile_size),
                    norm(z0 + dz * tile_size),
                ]));
            }
        }
    }

    let mut bounds = [[f32::INFINITY, f32::NEG_INFINITY]; 3];
    for corner in &corners {
        for (axis, b) in bounds.iter_mut().enumerate() {
            b[0] = b[0].min(corner[axis]);
            b[1] = b[1].max(corner[axis]);
        }
    }

    // A degenerate transform (w crossing zero) leaves NaN corners behind;
    // the widest interval is the sound answer there.
    let widen = |b: [f32; 2]| {
        if b[0] <= b[1] {
            Interval::new(b[0], b[1])
        } else {
            Interval::new(f32::NEG_INFINITY, f32::INFINITY)
        }
    };

    let x = widen(bounds[0]);
    let y = widen(bounds[1]);
    let z = if dim.is_3d() {
        widen(bounds[2])
    } else {
        // 2D renders bind Z to the view center, independent of the tile.
        Interval::from(view.center[2])
    };

    [x, y, z]
}

/// World-space center of a voxel.
fn voxel_world(view: &View, size: u32, px: u32, py: u32, pz: u32) -> [f32; 3] {
    let norm = |c: u32| 2.0 * (c as f32 + 0.5) / (size as f32) - 1.0;
    view.map_point([norm(px), norm(py), norm(pz)])
}

/// World-space center of a pixel in a 2D render, at the same device Z the
/// tile bounds use.
fn pixel_world_2d(view: &View, size: u32, px: u32, py: u32) -> [f32; 3] {
    let norm = |c: u32| 2.0 * (c as f32 + 0.5) / (size as f32) - 1.0;
    view.map_point([norm(px), norm(py), -1.0])
}
