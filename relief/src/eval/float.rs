//! Scalar and 2-lane float tape evaluation.

use crate::deriv::Pack2;
use crate::eval::TapeView;
use crate::subtape::SubtapePool;
use crate::tape::UNBOUND;

/// Evaluate a tape at a single point.
pub(crate) fn eval_scalar(
    view: &TapeView<'_>,
    pool: &SubtapePool,
    x: f32,
    y: f32,
    z: f32,
    regs: &mut Vec<f32>,
) -> f32 {
    let tape = view.tape;
    regs.clear();
    regs.resize(tape.slot_count() as usize, 0.0);

    let axes = tape.axes();
    for (slot, v) in axes.into_iter().zip([x, y, z]) {
        if slot != UNBOUND {
            regs[usize::from(slot)] = v;
        }
    }

    view.for_each(pool, |c| {
        use crate::clause::Opcode::*;

        let lhs = if c.lhs_is_imm() {
            tape.constant(c.lhs)
        } else {
            regs[usize::from(c.lhs)]
        };

        let value = if c.op.has_rhs() {
            let rhs = if c.rhs_is_imm() {
                tape.constant(c.rhs)
            } else {
                regs[usize::from(c.rhs)]
            };
            match c.op {
                Add => lhs + rhs,
                Sub => lhs - rhs,
                Mul => lhs * rhs,
                Div => lhs / rhs,
                // Ties keep the left side, matching choice recording.
                Min => {
                    if rhs < lhs {
                        rhs
                    } else {
                        lhs
                    }
                }
                Max => {
                    if rhs > lhs {
                        rhs
                    } else {
                        lhs
                    }
                }
                _ => unreachable!("binary opcode"),
            }
        } else {
            match c.op {
                Copy => lhs,
                Square => lhs * lhs,
                Sqrt => lhs.sqrt(),
                Neg => -lhs,
                Sin => lhs.sin(),
                Cos => lhs.cos(),
                Asin => lhs.asin(),
                Acos => lhs.acos(),
                Atan => lhs.atan(),
                Exp => lhs.exp(),
                Abs => lhs.abs(),
                Log => lhs.ln(),
                _ => unreachable!("unary opcode"),
            }
        };

        regs[usize::from(c.out)] = value;
    });

    regs[usize::from(tape.root())]
}

/// Evaluate a tape at two points jointly.
pub(crate) fn eval_pack2(
    view: &TapeView<'_>,
    pool: &SubtapePool,
    x: Pack2,
    y: Pack2,
    z: Pack2,
    regs: &mut Vec<Pack2>,
) -> Pack2 {
    let tape = view.tape;
    regs.clear();
    regs.resize(tape.slot_count() as usize, Pack2::splat(0.0));

    let axes = tape.axes();
    for (slot, v) in axes.into_iter().zip([x, y, z]) {
        if slot != UNBOUND {
            regs[usize::from(slot)] = v;
        }
    }

    view.for_each(pool, |c| {
        use crate::clause::Opcode::*;

        let lhs = if c.lhs_is_imm() {
            Pack2::splat(tape.constant(c.lhs))
        } else {
            regs[usize::from(c.lhs)]
        };

        let value = if c.op.has_rhs() {
            let rhs = if c.rhs_is_imm() {
                Pack2::splat(tape.constant(c.rhs))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtape::SubtapePool;
    use crate::tape::Tape;
    use relief_tree::Tree;

    #[test]
    fn scalar_matches_reference() {
        let mut t = Tree::new();
        let root = t.circle(0.25, -0.5, 0.75);
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let view = TapeView::new(&tape, 0);
        let mut regs = Vec::new();

        for (x, y) in [(0.0, 0.0), (0.25, -0.5), (1.0, 1.0), (-2.0, 0.5)] {
            let got = eval_scalar(&view, &pool, x, y, 0.0, &mut regs);
            let want = t.eval_point(root, x, y, 0.0);
            assert_eq!(got, want, "at ({x}, {y})");
        }
    }

    #[test]
    fn pack2_lanes_match_scalar() {
        let mut t = Tree::new();
        let a = t.sphere(0.5, 0.0, 0.0, 0.25);
        let b = t.sphere(-0.5, 0.0, 0.0, 0.25);
        let root = t.min(a, b);
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let view = TapeView::new(&tape, 0);

        let mut regs2 = Vec::new();
        let mut regs = Vec::new();

        let r = eval_pack2(
            &view,
            &pool,
            Pack2::new(0.5, -0.5),
            Pack2::splat(0.1),
            Pack2::new(0.0, 0.2),
            &mut regs2,
        );
        assert_eq!(r.lane(0), eval_scalar(&view, &pool, 0.5, 0.1, 0.0, &mut regs));
        assert_eq!(r.lane(1), eval_scalar(&view, &pool, -0.5, 0.1, 0.2, &mut regs));
    }

    #[test]
    fn axis_only_tape() {
        let mut t = Tree::new();
        let root = t.y();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let view = TapeView::new(&tape, 0);
        let mut regs = Vec::new();

        assert_eq!(eval_scalar(&view, &pool, 1.0, -3.5, 0.0, &mut regs), -3.5);
    }
}
