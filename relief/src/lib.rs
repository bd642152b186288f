/*!
A hierarchical rasterizer for closed-form implicit surfaces.

A shape is an arithmetic expression over the spatial variables X, Y and Z
(built with the `relief-tree` crate); the set of points where the
expression is non-positive is the rendered object. The expression is
compiled to a compact register-machine tape and rendered by recursive
spatial subdivision: every tile is evaluated once with interval
arithmetic, tiles provably inside or outside the shape are resolved
wholesale, and ambiguous tiles inherit a copy of the tape specialized to
their region before being subdivided further. Per-pixel evaluation only
ever runs on the smallest surviving tiles, against the most deeply pruned
tape.

2D renders produce a filled mask. 3D renders produce a depth image
(heightmap) and an RGB-encoded surface-normal image computed with
forward-mode automatic differentiation.

```
use relief::{Dimension, Renderer, View};
use relief_tree::Tree;

let mut tree = Tree::new();
let shape = tree.circle(0.0, 0.0, 0.5);

let mut renderer = Renderer::build(&tree, shape, 256, Dimension::Two).unwrap();
renderer.run(&View::default()).unwrap();
assert!(renderer.height_at(128, 128) > 0);
```
*/

#![forbid(unsafe_code)]

mod clause;
mod deriv;
mod error;
mod eval;
mod grid;
mod interval;
mod pixmap;
mod render;
mod subtape;
mod tape;

pub use relief_tree;

pub use error::Error;
pub use grid::Dimension;
pub use interval::{Choice, Interval};
pub use pixmap::Surface;
pub use render::{RenderSettings, RenderStats, Renderer, View};

// The view transform type is part of the public API.
pub use nalgebra;
