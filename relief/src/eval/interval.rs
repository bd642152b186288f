//! Per-tile interval evaluation and tape specialization.
//!
//! Every candidate tile is evaluated once with interval arithmetic over its
//! spatial bounds. The root interval classifies the tile wholesale when it
//! excludes zero; otherwise the recorded choice codes are replayed backwards
//! over the parent tape to write a pruned copy into freshly claimed subtape
//! chunks. Chunks are written from the high end down, so the root clause
//! lands at the end of the first chunk claimed and the chain's leaf-most
//! chunk holds the earliest clauses.

use crate::clause::{BANK_LHS, Clause, Opcode};
use crate::eval::{ChoiceBuffer, SlotSet, TapeView};
use crate::interval::{Choice, Interval};
use crate::subtape::{CHUNK_LEN, SubtapePool};
use crate::tape::UNBOUND;

/// Reusable per-worker state for tile evaluation.
pub(crate) struct IntervalScratch {
    regs: Vec<Interval>,
    pub choices: ChoiceBuffer,
    active: SlotSet,
}

impl IntervalScratch {
    pub fn new() -> Self {
        Self {
            regs: Vec::new(),
            choices: ChoiceBuffer::new(),
            active: SlotSet::new(),
        }
    }
}

/// Evaluate a tape over a box, recording one choice code per min/max.
pub(crate) fn eval_interval(
    view: &TapeView<'_>,
    pool: &SubtapePool,
    x: Interval,
    y: Interval,
    z: Interval,
    scratch: &mut IntervalScratch,
) -> Interval {
    let tape = view.tape;
    scratch.choices.clear();

    let regs = &mut scratch.regs;
    let choices = &mut scratch.choices;
    regs.clear();
    regs.resize(tape.slot_count() as usize, Interval::from(0.0));

    let axes = tape.axes();
    for (slot, v) in axes.into_iter().zip([x, y, z]) {
        if slot != UNBOUND {
            regs[usize::from(slot)] = v;
        }
    }

    view.for_each(pool, |c| {
        use crate::clause::Opcode::*;

        let lhs = if c.lhs_is_imm() {
            Interval::from(tape.constant(c.lhs))
        } else {
            regs[usize::from(c.lhs)]
        };

        let value = if c.op.has_rhs() {
            let rhs = if c.rhs_is_imm() {
                Interval::from(tape.constant(c.rhs))
            } else {
                regs[usize::from(c.rhs)]
            };
            match c.op {
                Add => lhs.add(rhs),
                Sub => lhs.sub(rhs),
                Mul => lhs.mul(rhs),
                Div => lhs.div(rhs),
                Min => {
                    let (v, choice) = lhs.min_choice(rhs);
                    choices.push(choice);
                    v
                }
                Max => {
                    let (v, choice) = lhs.max_choice(rhs);
                    choices.push(choice);
                    v
                }
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

/// Result of specializing a parent tape against recorded choices.
pub(crate) enum Specialized {
    /// A freshly written chain, and whether it still holds any min/max.
    Chain { handle: u32, terminal: bool },
    /// The pool ran dry; the caller keeps the parent tape.
    Exhausted,
}

/// Walk the parent tape backwards, replaying choice codes to prune resolved
/// min/max branches, and write the surviving clauses into claimed chunks.
///
/// A min/max whose choice selected one side becomes a copy, or is elided
/// entirely when its output already is the selected slot. Dead clauses
/// (those whose output no longer feeds the result) are dropped, but their
/// choice codes are still consumed to keep the replay aligned.
pub(crate) fn specialize(
    view: &TapeView<'_>,
    pool: &SubtapePool,
    scratch: &mut IntervalScratch,
) -> Specialized {
    let tape = view.tape;

    let active = &mut scratch.active;
    let choices = &scratch.choices;
    active.clear(tape.slot_count() as usize);
    active.set(tape.root());

    let Some(mut writer) = ChunkWriter::begin(pool) else {
        return Specialized::Exhausted;
    };

    let mut choice_idx = choices.len();
    let mut terminal = true;

    let complete = view.for_each_rev(pool, |c| {
        let choice = if c.op.is_choice() {
            choice_idx -= 1;
            Some(choices.get(choice_idx))
        } else {
            None
        };

        if !active.get(c.out) {
            return true;
        }

        match choice {
            Some(Choice::Left) => {
                if !c.lhs_is_imm() && c.lhs == c.out {
                    // The selected value already flows through this slot.
                    return true;
                }
                active.unset(c.out);
                if !c.lhs_is_imm() {
                    active.set(c.lhs);
                }
                writer.push(
                    pool,
                    Clause {
                        op: Opcode::Copy,
                        banks: c.banks & BANK_LHS,
                        out: c.out,
                        lhs: c.lhs,
                        rhs: 0,
                    },
                )
            }
            Some(Choice::Right) => {
                if !c.rhs_is_imm() && c.rhs == c.out {
                    return true;
                }
                active.unset(c.out);
                let banks = if c.rhs_is_imm() { BANK_LHS } else { 0 };
                if !c.rhs_is_imm() {
                    active.set(c.rhs);
                }
                writer.push(
                    pool,
                    Clause {
                        op: Opcode::Copy,
                        banks,
                        out: c.out,
                        lhs: c.rhs,
                        rhs: 0,
                    },
                )
            }
            _ => {
                if c.op.is_choice() {
                    terminal = false;
                }
                active.unset(c.out);
                if !c.lhs_is_imm() {
                    active.set(c.lhs);
                }
                if c.op.has_rhs() && !c.rhs_is_imm() {
                    active.set(c.rhs);
                }
                writer.push(pool, c)
            }
        }
    });

    if !complete {
        return Specialized::Exhausted;
    }
    debug_assert_eq!(choice_idx, 0, "choice replay out of alignment");

    Specialized::Chain {
        handle: writer.finish(pool),
        terminal,
    }
}

/// Backwards writer over a chain of chunks.
struct ChunkWriter {
    cur: u32,
    cursor: usize,
}

impl ChunkWriter {
    fn begin(pool: &SubtapePool) -> Option<Self> {
        let cur = pool.claim()?;
        Some(Self {
            cur,
            cursor: CHUNK_LEN,
        })
    }

    fn push(&mut self, pool: &SubtapePool, clause: Clause) -> bool {
        if self.cursor == 0 {
            let Some(fresh) = pool.claim() else {
                return false;
            };
            // The older chunk holds later clauses: it is closer to the
            // root, so the fresh chunk hangs off its leaf side.
            pool.chunk(self.cur).set_prev(fresh);
            pool.chunk(fresh).set_next(self.cur);
            self.cur = fresh;
            self.cursor = CHUNK_LEN;
        }
        self.cursor -= 1;
        pool.chunk(self.cur).write(self.cursor, clause);
        true
    }

    fn finish(self, pool: &SubtapePool) -> u32 {
        pool.chunk(self.cur).set_start(self.cursor);
        self.cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::float::eval_scalar;
    use crate::tape::Tape;
    use relief_tree::{NodeId, Tree};

    fn two_circle_union() -> (Tree, NodeId) {
        let mut t = Tree::new();
        let a = t.circle(0.5, 0.0, 0.25);
        let b = t.circle(-0.5, 0.0, 0.25);
        let root = t.min(a, b);
        (t, root)
    }

    fn iv(l: f32, u: f32) -> Interval {
        Interval::new(l, u)
    }

    #[test]
    fn interval_eval_matches_reference_on_points() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(4);
        let view = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        for (x, y) in [(0.5, 0.0), (0.0, 0.0), (-0.6, 0.1)] {
            let r = eval_interval(&view, &pool, iv(x, x), iv(y, y), iv(0.0, 0.0), &mut scratch);
            let want = t.eval_point(root, x, y, 0.0);
            assert!(r.contains(want));
            assert!(r.width() < 1e-5);
        }
    }

    #[test]
    fn classification_bounds_are_sound() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(4);
        let view = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        // A box fully inside the right-hand circle.
        let r = eval_interval(
            &view,
            &pool,
            iv(0.45, 0.55),
            iv(-0.05, 0.05),
            iv(0.0, 0.0),
            &mut scratch,
        );
        assert!(r.upper() < 0.0);

        // A box far away from both.
        let r = eval_interval(
            &view,
            &pool,
            iv(10.0, 11.0),
            iv(10.0, 11.0),
            iv(0.0, 0.0),
            &mut scratch,
        );
        assert!(r.lower() > 0.0);
    }

    // P2: the specialized tape must reproduce the parent bit-for-bit at any
    // point inside the tile it was specialized for.
    #[test]
    fn specialization_is_equivalent_inside_the_tile() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(16);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        // A box straddling the right-hand circle's boundary; the left
        // circle is provably irrelevant there.
        let (x, y) = (iv(0.3, 0.6), iv(-0.1, 0.2));
        let r = eval_interval(&parent, &pool, x, y, iv(0.0, 0.0), &mut scratch);
        assert!(r.contains(0.0));

        let Specialized::Chain { handle, terminal } = specialize(&parent, &pool, &mut scratch)
        else {
            panic!("pool should not be exhausted");
        };
        assert!(terminal, "one circle pruned away leaves no min/max");

        let child = TapeView::new(&tape, handle);
        let mut regs = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let px = x.lower() + (i as f32 / 7.0) * x.width();
                let py = y.lower() + (j as f32 / 7.0) * y.width();
                let a = eval_scalar(&parent, &pool, px, py, 0.0, &mut regs);
                let b = eval_scalar(&child, &pool, px, py, 0.0, &mut regs);
                assert_eq!(a.to_bits(), b.to_bits(), "at ({px}, {py})");
            }
        }
    }

    // P4: a terminal chain holds no min/max clause.
    #[test]
    fn terminal_chains_hold_no_choices() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(16);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        eval_interval(
            &parent,
            &pool,
            iv(0.3, 0.6),
            iv(-0.1, 0.2),
            iv(0.0, 0.0),
            &mut scratch,
        );
        let Specialized::Chain { handle, terminal } = specialize(&parent, &pool, &mut scratch)
        else {
            panic!("pool should not be exhausted");
        };
        assert!(terminal);

        let child = TapeView::new(&tape, handle);
        let mut saw_choice = false;
        child.for_each(&pool, |c| saw_choice |= c.op.is_choice());
        assert!(!saw_choice);
    }

    #[test]
    fn ambiguous_tiles_keep_their_choices() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(16);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        // A box covering both circles cannot resolve the union.
        eval_interval(
            &parent,
            &pool,
            iv(-1.0, 1.0),
            iv(-1.0, 1.0),
            iv(0.0, 0.0),
            &mut scratch,
        );
        let Specialized::Chain { handle, terminal } = specialize(&parent, &pool, &mut scratch)
        else {
            panic!("pool should not be exhausted");
        };
        assert!(!terminal);

        let child = TapeView::new(&tape, handle);
        let mut choices = 0;
        child.for_each(&pool, |c| {
            if c.op.is_choice() {
                choices += 1;
            }
        });
        assert_eq!(choices, 1);
    }

    // P5: chains terminate in both directions and share no chunks.
    #[test]
    fn long_chains_stay_well_linked() {
        let mut t = Tree::new();
        let mut spheres = Vec::new();
        for i in 0..16 {
            let angle = i as f32 * 0.4;
            spheres.push(t.sphere(angle.cos() * 0.6, angle.sin() * 0.6, 0.0, 0.2));
        }
        let mut root = spheres[0];
        for s in &spheres[1..] {
            root = t.min(root, *s);
        }
        let tape = Tape::compile(&t, root).unwrap();
        assert!(tape.clauses().len() > CHUNK_LEN);

        let pool = SubtapePool::new(64);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        // A box covering everything keeps the whole tape alive, forcing a
        // multi-chunk chain.
        eval_interval(
            &parent,
            &pool,
            iv(-1.0, 1.0),
            iv(-1.0, 1.0),
            iv(-1.0, 1.0),
            &mut scratch,
        );
        let Specialized::Chain { handle, .. } = specialize(&parent, &pool, &mut scratch) else {
            panic!("pool should not be exhausted");
        };

        // Walk leafward to rootward, collecting ids.
        let mut ids = vec![handle];
        let mut at = handle;
        assert_eq!(pool.chunk(handle).prev(), 0);
        while pool.chunk(at).next() != 0 {
            at = pool.chunk(at).next();
            ids.push(at);
        }
        assert!(ids.len() > 1);

        // And back.
        let mut back = vec![at];
        while pool.chunk(at).prev() != 0 {
            at = pool.chunk(at).prev();
            back.push(at);
        }
        back.reverse();
        assert_eq!(ids, back);

        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());

        // The chain evaluates just like the parent.
        let child = TapeView::new(&tape, handle);
        let mut regs = Vec::new();
        for (x, y, z) in [(0.0, 0.0, 0.0), (0.6, 0.0, 0.1), (-0.4, 0.4, -0.2)] {
            let a = eval_scalar(&parent, &pool, x, y, z, &mut regs);
            let b = eval_scalar(&child, &pool, x, y, z, &mut regs);
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn respecializing_a_chain_prunes_further() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(16);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        // First pass: both circles in play.
        eval_interval(
            &parent,
            &pool,
            iv(-1.0, 1.0),
            iv(-0.3, 0.3),
            iv(0.0, 0.0),
            &mut scratch,
        );
        let Specialized::Chain { handle, .. } = specialize(&parent, &pool, &mut scratch) else {
            panic!("pool should not be exhausted");
        };

        // Second pass against the chain: only the left circle remains.
        let mid = TapeView::new(&tape, handle);
        eval_interval(
            &mid,
            &pool,
            iv(-0.6, -0.4),
            iv(-0.1, 0.1),
            iv(0.0, 0.0),
            &mut scratch,
        );
        let Specialized::Chain { handle, terminal } = specialize(&mid, &pool, &mut scratch) else {
            panic!("pool should not be exhausted");
        };
        assert!(terminal);

        let child = TapeView::new(&tape, handle);
        let mut regs = Vec::new();
        let a = eval_scalar(&parent, &pool, -0.5, 0.05, 0.0, &mut regs);
        let b = eval_scalar(&child, &pool, -0.5, 0.05, 0.0, &mut regs);
        assert_eq!(a.to_bits(), b.to_bits());
        assert!(a < 0.0);
    }

    #[test]
    fn exhausted_pool_reports_instead_of_failing() {
        let (t, root) = two_circle_union();
        let tape = Tape::compile(&t, root).unwrap();
        let pool = SubtapePool::new(2);
        let parent = TapeView::new(&tape, 0);
        let mut scratch = IntervalScratch::new();

        eval_interval(
            &parent,
            &pool,
            iv(-1.0, 1.0),
            iv(-1.0, 1.0),
            iv(0.0, 0.0),
            &mut scratch,
        );

        // One chunk is claimable, the second claim fails.
        assert!(matches!(
            specialize(&parent, &pool, &mut scratch),
            Specialized::Chain { .. }
        ));
        eval_interval(
            &parent,
            &pool,
            iv(-1.0, 1.0),
            iv(-1.0, 1.0),
            iv(0.0, 0.0),
            &mut scratch,
        );
        assert!(matches!(
            specialize(&parent, &pool, &mut scratch),
            Specialized::Exhausted
        ));
        assert_eq!(pool.exhausted_count(), 1);
    }
}
