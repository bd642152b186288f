//! Derivative tape evaluation and normal packing.

use crate::deriv::Deriv;
use crate::eval::TapeView;
use crate::subtape::SubtapePool;
use crate::tape::UNBOUND;

/// Evaluate a tape with forward-mode derivatives at a single point.
pub(crate) fn eval_deriv(
    view: &TapeView<'_>,
    pool: &SubtapePool,
    x: f32,
    y: f32,
    z: f32,
    regs: &mut Vec<Deriv>,
) -> Deriv {
    let tape = view.tape;
    regs.clear();
    regs.resize(tape.slot_count() as usize, Deriv::constant(0.0));

    let axes = tape.axes();
    for (axis, (slot, v)) in axes.into_iter().zip([x, y, z]).enumerate() {
        if slot != UNBOUND {
            regs[usize::from(slot)] = Deriv::var(v, axis);
        }
    }

    view.for_each(pool, |c| {
        use crate::clause::Opcode::*;

        let lhs = if c.lhs_is_imm() {
            Deriv::constant(tape.constant(c.lhs))
        } else {
            regs[usize::from(c.lhs)]
        };

        let value = if c.op.has_rhs() {
            let rhs = if c.rhs_is_imm() {
                Deriv::constant(tape.constant(c.rhs))
            } else {
                regs[usize::from(c.rhs)]
            };
            match c.op {
                Add => lhs.add(rhs),
                Sub => lhs.sub(rhs),
                Mul => lhs.mul(rhs),
                Div => lhs.div(rhs),
                Min => lhs.min(rhs),
                Max => lhs.max(rhs),
                _ => unreachable!("binary opcode"),
            }
        } else {
            match c.op {
                Copy => lhs,
                Square => lhs.square(),
                Sqrt => lhs.sqrt(),
                Neg => lhs.neg(),
                Sin => lhs.sin(),
                Cos => lhs.cos(),
                Asin => lhs.asin(),
                Acos => lhs.acos(),
                Atan => lhs.atan(),
                Exp => lhs.exp(),
                Abs => lhs.abs(),
                Log => lhs.log(),
                _ => unreachable!("unary opcode"),
            }
        };

        regs[usize::from(c.out)] = value;
    });

    regs[usize::from(tape.root())]
}

/// Normalize a gradient and pack it as `0xFF << 24 | dz << 16 | dy << 8 | dx`
/// with each component mapped from [-1, 1] onto a byte.
///
/// Degenerate gradients pack to an opaque zero vector, which is still
/// nonzero as a word so the normal plane records coverage.
pub(crate) fn pack_normal(g: Deriv) -> u32 {
    let norm = (g.dx * g.dx + g.dy * g.dy + g.dz * g.dz).sqrt();
    if !norm.is_normal() {
        return 0xFF00_0000;
    }

    let scale = 127.0 / norm;
    let byte = |d: f32| ((d * scale + 128.0).clamp(0.0, 255.0)) as u32;

    0xFF00_0000 | (byte(g.dz) << 16) | (byte(g.dy) << 8) | byte(g.dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtape::SubtapePool;
    use crate::tape::Tape;
    use relief_tree::Tree;

    #[test]
    fn sphere_gradient_through_tape() {
        let mut t = Tree::new();
        let root = t.sphere(0.0, 0.0, 0.0, 1.0);
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let view = TapeView::new(&tape, 0);
        let mut regs = Vec::new();

        let g = eval_deriv(&view, &pool, 0.0, 0.0, 1.0, &mut regs);
        assert!((g.v).abs() < 1e-6);
        assert!((g.dz - 1.0).abs() < 1e-5);
        assert!(g.dx.abs() < 1e-5);
        assert!(g.dy.abs() < 1e-5);
    }

    #[test]
    fn union_gradient_follows_chosen_branch() {
        let mut t = Tree::new();
        let a = t.sphere(0.5, 0.0, 0.0, 0.25);
        let b = t.sphere(-0.5, 0.0, 0.0, 0.25);
        let root = t.min(a, b);
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let view = TapeView::new(&tape, 0);
        let mut regs = Vec::new();

        // Near the right-hand sphere the gradient points away from its
        // center at (0.5, 0, 0).
        let g = eval_deriv(&view, &pool, 0.75, 0.0, 0.0, &mut regs);
        assert!((g.dx - 1.0).abs() < 1e-5);
    }

    #[test]
    fn packed_normal_layout() {
        let up = Deriv {
            v: 0.0,
            dx: 0.0,
            dy: 0.0,
            dz: 1.0,
        };
        let packed = pack_normal(up);
        assert_eq!(packed >> 24, 0xFF);
        assert_eq!((packed >> 16) & 0xFF, 255);
        assert_eq!((packed >> 8) & 0xFF, 128);
        assert_eq!(packed & 0xFF, 128);

        let degenerate = pack_normal(Deriv::constant(1.0));
        assert_eq!(degenerate, 0xFF00_0000);
    }
}
