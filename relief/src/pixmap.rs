//! Depth and normal image planes.
//!
//! Both output surfaces are square planes of `u32` samples. Workers publish
//! results with atomic max, which makes the final image independent of
//! write order; occlusion queries read the same plane without
//! synchronization and may at worst be pessimistic by one stage.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Which rendered surface a readback refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The depth image: highest inside-voxel Z in 3D, fill mask in 2D.
    Depth,
    /// The RGB-encoded surface normals (3D renders only).
    Normal,
}

/// A square plane of `u32` samples written with max semantics.
pub(crate) struct Plane {
    size: u32,
    cells: Box<[AtomicU32]>,
}

impl Plane {
    pub fn new(size: u32) -> Self {
        let n = (size * size) as usize;
        Self {
            size,
            cells: (0..n).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn clear(&self) {
        for cell in &self.cells {
            cell.store(0, Relaxed);
        }
    }

    fn idx(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.size && y < self.size);
        (y * self.size + x) as usize
    }

    pub fn fetch_max(&self, x: u32, y: u32, v: u32) {
        self.cells[self.idx(x, y)].fetch_max(v, Relaxed);
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.idx(x, y)].load(Relaxed)
    }

    /// Copy out the top-left `crop` × `crop` region, row-major.
    pub fn snapshot(&self, crop: u32) -> Vec<u32> {
        debug_assert!(crop <= self.size);
        let mut out = Vec::with_capacity((crop * crop) as usize);
        for y in 0..crop {
            for x in 0..crop {
                out.push(self.get(x, y));
            }
        }
        out
    }
}

/// Nearest-neighbor copy of a square source into a square destination.
///
/// In append mode, destination samples are preserved wherever the source
/// has no coverage (a zero sample).
pub(crate) fn blit(src: &[u32], src_size: u32, dst: &mut [u32], dst_size: u32, append: bool) {
    assert_eq!(src.len(), (src_size * src_size) as usize);
    assert_eq!(dst.len(), (dst_size * dst_size) as usize);

    for y in 0..dst_size {
        let sy = y * src_size / dst_size;
        for x in 0..dst_size {
            let sx = x * src_size / dst_size;
            let v = src[(sy * src_size + sx) as usize];
            if v != 0 || !append {
                dst[(y * dst_size + x) as usize] = v;
            }
        }
    }
}

/// Encode a snapshot as a PNG.
///
/// Depth samples are scaled into an 8-bit grayscale ramp; normal samples
/// already carry packed RGBA bytes and are emitted as-is.
pub(crate) fn encode_png(data: &[u32], size: u32, surface: Surface) -> Vec<u8> {
    let mut png = Vec::new();
    let cursor = Cursor::new(&mut png);
    let encoder = PngEncoder::new(cursor);

    match surface {
        Surface::Depth => {
            let max = data.iter().copied().max().unwrap_or(0).max(1);
            let gray: Vec<u8> = data
                .iter()
                .map(|&v| ((u64::from(v) * 255) / u64::from(max)) as u8)
                .collect();
            encoder
                .write_image(&gray, size, size, ExtendedColorType::L8)
                .expect("failed to encode image");
        }
        Surface::Normal => {
            let bytes: &[u8] = bytemuck::cast_slice(data);
            encoder
                .write_image(bytes, size, size, ExtendedColorType::Rgba8)
                .expect("failed to encode image");
        }
    }

    png
}
