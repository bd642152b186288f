//! Tile-grid coordinate math and per-level masks.
//!
//! A render subdivides its image into a ladder of regular tile grids; 3D
//! renders descend 64 → 16 → 4 voxels per tile side, 2D renders 64 → 8
//! pixels. Tiles are addressed by a packed position. Each level keeps a
//! mask grid recording, per tile column, the highest Z of any tile proven
//! fully inside the shape; the masks drive occlusion culling between stages
//! and are composited into the final depth image at the end.

use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Tile side lengths per stage for 3D renders, in voxels.
pub(crate) const STAGES_3D: [u32; 3] = [64, 16, 4];
/// Tile side lengths per stage for 2D renders, in pixels.
pub(crate) const STAGES_2D: [u32; 2] = [64, 8];

/// Dimensionality of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Flat 2D fill mask.
    Two,
    /// Heightmap plus surface normals.
    Three,
}

impl Dimension {
    pub(crate) fn stages(self) -> &'static [u32] {
        match self {
            Self::Two => &STAGES_2D,
            Self::Three => &STAGES_3D,
        }
    }

    pub(crate) fn is_3d(self) -> bool {
        self == Self::Three
    }
}

/// Packed position of a tile within its stage grid, 10 bits per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TilePos(u32);

impl TilePos {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        debug_assert!(x < 1024 && y < 1024 && z < 1024);
        Self(x | (y << 10) | (z << 20))
    }

    /// Recover a position from a linear tile index at the given grid size.
    pub fn from_linear(idx: usize, tiles_per_side: u32, dim: Dimension) -> Self {
        let tps = tiles_per_side as usize;
        let x = (idx % tps) as u32;
        let y = ((idx / tps) % tps) as u32;
        let z = match dim {
            Dimension::Two => 0,
            Dimension::Three => (idx / (tps * tps)) as u32,
        };
        Self::new(x, y, z)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn x(self) -> u32 {
        self.0 & 0x3FF
    }

    pub fn y(self) -> u32 {
        (self.0 >> 10) & 0x3FF
    }

    pub fn z(self) -> u32 {
        (self.0 >> 20) & 0x3FF
    }
}

/// Per-level record of filled tile columns.
///
/// One cell per (x, y) tile column, holding the maximum top-Z of any tile
/// in that column proven fully inside the shape (2D renders store the fill
/// sentinel instead). Written with max semantics from many workers at once.
pub(crate) struct MaskGrid {
    tiles_per_side: u32,
    cells: Box<[AtomicU32]>,
}

impl MaskGrid {
    pub fn new(tiles_per_side: u32) -> Self {
        let n = (tiles_per_side * tiles_per_side) as usize;
        Self {
            tiles_per_side,
            cells: (0..n).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn tiles_per_side(&self) -> u32 {
        self.tiles_per_side
    }

    pub fn clear(&self) {
        for cell in &self.cells {
            cell.store(0, Relaxed);
        }
    }

    fn idx(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.tiles_per_side && y < self.tiles_per_side);
        (y * self.tiles_per_side + x) as usize
    }

    pub fn fetch_max(&self, x: u32, y: u32, v: u32) {
        self.cells[self.idx(x, y)].fetch_max(v, Relaxed);
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.idx(x, y)].load(Relaxed)
    }
}

/// Build the cumulative occluder grid for a stage by upsampling the parent
/// stage's occluders and merging the parent's filled mask into them.
///
/// The result has one cell per tile column at the child resolution; a tile
/// whose top-Z does not exceed its cell is fully hidden and can be culled
/// without evaluation.
pub(crate) fn upsample_occluder(
    parent_occluder: &[u32],
    parent_mask: &MaskGrid,
    child_tiles_per_side: u32,
) -> Vec<u32> {
    let parent_tps = parent_mask.tiles_per_side();
    let ratio = child_tiles_per_side / parent_tps;
    debug_assert!(ratio >= 1 && child_tiles_per_side % parent_tps == 0);

    let mut cells = vec![0u32; (child_tiles_per_side * child_tiles_per_side) as usize];
    for y in 0..child_tiles_per_side {
        for x in 0..child_tiles_per_side {
            let (px, py) = (x / ratio, y / ratio);
            let inherited = parent_occluder[(py * parent_tps + px) as usize];
            let filled = parent_mask.get(px, py);
            cells[(y * child_tiles_per_side + x) as usize] = inherited.max(filled);
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_round_trip() {
        let p = TilePos::new(5, 700, 123);
        assert_eq!(p.x(), 5);
        assert_eq!(p.y(), 700);
        assert_eq!(p.z(), 123);
        assert_eq!(TilePos::from_bits(p.bits()), p);
    }

    #[test]
    fn linear_enumeration_3d() {
        let tps = 4;
        let p = TilePos::from_linear(1 + 2 * 4 + 3 * 16, tps, Dimension::Three);
        assert_eq!((p.x(), p.y(), p.z()), (1, 2, 3));
    }

    #[test]
    fn linear_enumeration_2d_has_no_z() {
        let p = TilePos::from_linear(7 + 3 * 8, 8, Dimension::Two);
        assert_eq!((p.x(), p.y(), p.z()), (7, 3, 0));
    }

    #[test]
    fn mask_accumulates_max() {
        let mask = MaskGrid::new(2);
        mask.fetch_max(1, 0, 10);
        mask.fetch_max(1, 0, 7);
        assert_eq!(mask.get(1, 0), 10);
        assert_eq!(mask.get(0, 0), 0);

        mask.clear();
        assert_eq!(mask.get(1, 0), 0);
    }

    #[test]
    fn occluder_upsample_merges_mask() {
        let parent = MaskGrid::new(2);
        parent.fetch_max(0, 0, 63);
        parent.fetch_max(1, 1, 31);
        let parent_occluder = vec![0, 0, 40, 0];

        let cells = upsample_occluder(&parent_occluder, &parent, 4);
        assert_eq!(cells.len(), 16);
        // Children of (0, 0) inherit the filled mask.
        assert_eq!(cells[0], 63);
        assert_eq!(cells[4 + 1], 63);
        // Children of (0, 1) inherit the previous occluder.
        assert_eq!(cells[2 * 4], 40);
        // Children of (1, 1) get the smaller filled depth.
        assert_eq!(cells[3 * 4 + 3], 31);
    }
}
