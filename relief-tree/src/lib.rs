/*!
A crate for building expression trees of closed-form implicit surfaces.

A shape is an arithmetic expression over the spatial variables X, Y and Z;
the zero iso-surface of the expression is the surface of the shape. Trees are
built through a deduplicating arena, so structurally identical subexpressions
share a single node and the node list is a topological order by construction:
every operand of a node precedes it.

The operator set here is the full front-end set. Renderers are free to accept
only a subset of it; [`Tree::eval_point`] supports all of it and serves as the
brute-force reference for testing such renderers.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use rustc_hash::FxHashMap;

/// Identifier of a node within a [`Tree`].
///
/// Ids index the tree's node list and are ordered topologically: the operands
/// of a node always carry smaller ids than the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Index of the node in [`Tree::nodes`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operator of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TreeOp {
    // Terminals.
    X,
    Y,
    Z,
    Const,
    // Unary operators.
    Square,
    Sqrt,
    Neg,
    Sin,
    Cos,
    Asin,
    Acos,
    Atan,
    Exp,
    Abs,
    Ln,
    Tan,
    Recip,
    // Binary operators.
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Atan2,
    Pow,
    NthRoot,
    Mod,
    Compare,
}

impl TreeOp {
    /// Number of node operands the operator takes (0, 1 or 2).
    pub fn arity(self) -> usize {
        match self {
            Self::X | Self::Y | Self::Z | Self::Const => 0,
            Self::Square
            | Self::Sqrt
            | Self::Neg
            | Self::Sin
            | Self::Cos
            | Self::Asin
            | Self::Acos
            | Self::Atan
            | Self::Exp
            | Self::Abs
            | Self::Ln
            | Self::Tan
            | Self::Recip => 1,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Min
            | Self::Max
            | Self::Atan2
            | Self::Pow
            | Self::NthRoot
            | Self::Mod
            | Self::Compare => 2,
        }
    }
}

/// A single expression node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// The operator of this node.
    pub op: TreeOp,
    /// Constant payload; only meaningful when `op` is [`TreeOp::Const`].
    pub value: f32,
    /// First operand, if `op` takes one.
    pub lhs: Option<NodeId>,
    /// Second operand, if `op` takes two.
    pub rhs: Option<NodeId>,
}

/// A deduplicating arena of expression nodes.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    interned: FxHashMap<NodeKey, NodeId>,
}

// Constants are keyed by their bit pattern so that -0.0 and 0.0 stay distinct
// and NaN payloads dedup consistently.
type NodeKey = (TreeOp, u32, u32, u32);

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The nodes of the tree, in topological order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn intern(&mut self, op: TreeOp, value: f32, lhs: Option<NodeId>, rhs: Option<NodeId>) -> NodeId {
        let key = (
            op,
            value.to_bits(),
            lhs.map_or(u32::MAX, |n| n.0),
            rhs.map_or(u32::MAX, |n| n.0),
        );

        if let Some(id) = self.interned.get(&key) {
            return *id;
        }

        let id = NodeId(u32::try_from(self.nodes.len()).expect("tree node count overflow"));
        self.nodes.push(Node { op, value, lhs, rhs });
        self.interned.insert(key, id);

        id
    }

    /// The X spatial variable.
    pub fn x(&mut self) -> NodeId {
        self.intern(TreeOp::X, 0.0, None, None)
    }

    /// The Y spatial variable.
    pub fn y(&mut self) -> NodeId {
        self.intern(TreeOp::Y, 0.0, None, None)
    }

    /// The Z spatial variable.
    pub fn z(&mut self) -> NodeId {
        self.intern(TreeOp::Z, 0.0, None, None)
    }

    /// A floating-point constant.
    pub fn constant(&mut self, value: f32) -> NodeId {
        self.intern(TreeOp::Const, value, None, None)
    }

    /// A unary operator node.
    pub fn unary(&mut self, op: TreeOp, lhs: NodeId) -> NodeId {
        debug_assert_eq!(op.arity(), 1, "not a unary operator: {op:?}");
        self.intern(op, 0.0, Some(lhs), None)
    }

    /// A binary operator node.
    pub fn binary(&mut self, op: TreeOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        debug_assert_eq!(op.arity(), 2, "not a binary operator: {op:?}");
        self.intern(op, 0.0, Some(lhs), Some(rhs))
    }

    /// `lhs + rhs`.
    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`.
    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`.
    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Mul, lhs, rhs)
    }

    /// `lhs / rhs`.
    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Div, lhs, rhs)
    }

    /// The smaller of `lhs` and `rhs` (CSG union of two shapes).
    pub fn min(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Min, lhs, rhs)
    }

    /// The larger of `lhs` and `rhs` (CSG intersection of two shapes).
    pub fn max(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(TreeOp::Max, lhs, rhs)
    }

    /// `lhs * lhs`.
    pub fn square(&mut self, lhs: NodeId) -> NodeId {
        self.unary(TreeOp::Square, lhs)
    }

    /// `sqrt(lhs)`.
    pub fn sqrt(&mut self, lhs: NodeId) -> NodeId {
        self.unary(TreeOp::Sqrt, lhs)
    }

    /// `-lhs`.
    pub fn neg(&mut self, lhs: NodeId) -> NodeId {
        self.unary(TreeOp::Neg, lhs)
    }

    /// `abs(lhs)`.
    pub fn abs(&mut self, lhs: NodeId) -> NodeId {
        self.unary(TreeOp::Abs, lhs)
    }

    /// Natural logarithm of `lhs`.
    pub fn ln(&mut self, lhs: NodeId) -> NodeId {
        self.unary(TreeOp::Ln, lhs)
    }

    /// Evaluate the subtree rooted at `root` at a single point.
    ///
    /// Supports the complete operator set and is deliberately naive; it is
    /// the reference against which renderers are validated.
    pub fn eval_point(&self, root: NodeId, x: f32, y: f32, z: f32) -> f32 {
        let mut values = vec![0.0f32; root.index() + 1];

        for (i, node) in self.nodes[..=root.index()].iter().enumerate() {
            let lhs = node.lhs.map_or(0.0, |n| values[n.index()]);
            let rhs = node.rhs.map_or(0.0, |n| values[n.index()]);

            values[i] = match node.op {
                TreeOp::X => x,
                TreeOp::Y => y,
                TreeOp::Z => z,
                TreeOp::Const => node.value,
                TreeOp::Square => lhs * lhs,
                TreeOp::Sqrt => lhs.sqrt(),
                TreeOp::Neg => -lhs,
                TreeOp::Sin => lhs.sin(),
                TreeOp::Cos => lhs.cos(),
                TreeOp::Asin => lhs.asin(),
                TreeOp::Acos => lhs.acos(),
                TreeOp::Atan => lhs.atan(),
                TreeOp::Exp => lhs.exp(),
                TreeOp::Abs => lhs.abs(),
                TreeOp::Ln => lhs.ln(),
                TreeOp::Tan => lhs.tan(),
                TreeOp::Recip => 1.0 / lhs,
                TreeOp::Add => lhs + rhs,
                TreeOp::Sub => lhs - rhs,
                TreeOp::Mul => lhs * rhs,
                TreeOp::Div => lhs / rhs,
                TreeOp::Min => lhs.min(rhs),
                TreeOp::Max => lhs.max(rhs),
                TreeOp::Atan2 => lhs.atan2(rhs),
                TreeOp::Pow => lhs.powf(rhs),
                TreeOp::NthRoot => lhs.powf(1.0 / rhs),
                TreeOp::Mod => lhs - rhs * (lhs / rhs).floor(),
                TreeOp::Compare => {
                    if lhs < rhs {
                        -1.0
                    } else if lhs > rhs {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
        }

        values[root.index()]
    }

    /// Build the distance-like field of a sphere with the given center and
    /// radius: `sqrt((x-cx)^2 + (y-cy)^2 + (z-cz)^2) - r`.
    pub fn sphere(&mut self, cx: f32, cy: f32, cz: f32, r: f32) -> NodeId {
        let (x, y, z) = (self.x(), self.y(), self.z());

        let dx = self.shifted(x, cx);
        let dy = self.shifted(y, cy);
        let dz = self.shifted(z, cz);

        let xx = self.square(dx);
        let yy = self.square(dy);
        let zz = self.square(dz);

        let xy = self.add(xx, yy);
        let xyz = self.add(xy, zz);
        let len = self.sqrt(xyz);

        let r = self.constant(r);
        self.sub(len, r)
    }

    /// Build the field of a circle in the XY plane: ignores Z entirely.
    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) -> NodeId {
        let (x, y) = (self.x(), self.y());

        let dx = self.shifted(x, cx);
        let dy = self.shifted(y, cy);

        let xx = self.square(dx);
        let yy = self.square(dy);

        let xy = self.add(xx, yy);
        let len = self.sqrt(xy);

        let r = self.constant(r);
        self.sub(len, r)
    }

    fn shifted(&mut self, var: NodeId, offset: f32) -> NodeId {
        if offset == 0.0 {
            var
        } else {
            let c = self.constant(offset);
            self.sub(var, c)
        }
    }
}
