//! Render a blobby union of spheres to depth and normal PNGs.

use relief::relief_tree::Tree;
use relief::{Dimension, Renderer, Surface, View};

fn main() {
    let mut tree = Tree::new();
    let a = tree.sphere(-0.4, 0.0, 0.0, 0.5);
    let b = tree.sphere(0.4, 0.2, 0.2, 0.4);
    let c = tree.sphere(0.2, -0.4, -0.1, 0.3);
    let ab = tree.min(a, b);
    let shape = tree.min(ab, c);

    let mut renderer = Renderer::build(&tree, shape, 512, Dimension::Three).unwrap();
    renderer.run(&View::default()).unwrap();

    std::fs::write("depth.png", renderer.to_png(Surface::Depth)).unwrap();
    std::fs::write("normal.png", renderer.to_png(Surface::Normal)).unwrap();

    let stats = renderer.stats();
    println!(
        "rendered with {} subtape chunks, tiles per stage: {:?}",
        stats.chunks_used, stats.tiles_in
    );
}
