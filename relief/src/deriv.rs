//! Forward-mode derivatives and the 2-lane float pack.
//!
//! [`Deriv`] carries a value together with its three spatial partials and is
//! what the normal pass evaluates tapes with. [`Pack2`] evaluates two
//! adjacent voxels jointly in the depth pass to amortize tape traversal.

/// A value with partial derivatives along X, Y and Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Deriv {
    pub v: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl Deriv {
    pub fn constant(v: f32) -> Self {
        Self {
            v,
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
        }
    }

    pub fn var(v: f32, axis: usize) -> Self {
        let mut d = Self::constant(v);
        match axis {
            0 => d.dx = 1.0,
            1 => d.dy = 1.0,
            _ => d.dz = 1.0,
        }
        d
    }

    fn chain(self, v: f32, dv: f32) -> Self {
        Self {
            v,
            dx: self.dx * dv,
            dy: self.dy * dv,
            dz: self.dz * dv,
        }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self {
            v: self.v + rhs.v,
            dx: self.dx + rhs.dx,
            dy: self.dy + rhs.dy,
            dz: self.dz + rhs.dz,
        }
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self {
            v: self.v - rhs.v,
            dx: self.dx - rhs.dx,
            dy: self.dy - rhs.dy,
            dz: self.dz - rhs.dz,
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        Self {
            v: self.v * rhs.v,
            dx: self.dx * rhs.v + rhs.dx * self.v,
            dy: self.dy * rhs.v + rhs.dy * self.v,
            dz: self.dz * rhs.v + rhs.dz * self.v,
        }
    }

    pub fn div(self, rhs: Self) -> Self {
        let denom = rhs.v * rhs.v;
        Self {
            v: self.v / rhs.v,
            dx: (self.dx * rhs.v - rhs.dx * self.v) / denom,
            dy: (self.dy * rhs.v - rhs.dy * self.v) / denom,
            dz: (self.dz * rhs.v - rhs.dz * self.v) / denom,
        }
    }

    /// Minimum by value; the left side wins ties so that choice recording and
    /// runtime evaluation stay consistent.
    pub fn min(self, rhs: Self) -> Self {
        if rhs.v < self.v { rhs } else { self }
    }

    /// Maximum by value; ties keep the left side.
    pub fn max(self, rhs: Self) -> Self {
        if rhs.v > self.v { rhs } else { self }
    }

    pub fn neg(self) -> Self {
        Self {
            v: -self.v,
            dx: -self.dx,
            dy: -self.dy,
            dz: -self.dz,
        }
    }

    pub fn abs(self) -> Self {
        if self.v < 0.0 { self.neg() } else { self }
    }

    // The value is computed as lhs * lhs rather than through a dedicated
    // square, matching the scalar kernel to within one ulp.
    pub fn square(self) -> Self {
        self.chain(self.v * self.v, 2.0 * self.v)
    }

    pub fn sqrt(self) -> Self {
        let root = self.v.sqrt();
        self.chain(root, 0.5 / root)
    }

    pub fn sin(self) -> Self {
        self.chain(self.v.sin(), self.v.cos())
    }

    pub fn cos(self) -> Self {
        self.chain(self.v.cos(), -self.v.sin())
    }

    pub fn asin(self) -> Self {
        self.chain(self.v.asin(), 1.0 / (1.0 - self.v * self.v).sqrt())
    }

    pub fn acos(self) -> Self {
        self.chain(self.v.acos(), -1.0 / (1.0 - self.v * self.v).sqrt())
    }

    pub fn atan(self) -> Self {
        self.chain(self.v.atan(), 1.0 / (1.0 + self.v * self.v))
    }

    pub fn exp(self) -> Self {
        let e = self.v.exp();
        self.chain(e, e)
    }

    pub fn log(self) -> Self {
        self.chain(self.v.ln(), 1.0 / self.v)
    }
}

/// Two float lanes evaluated jointly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pack2(pub [f32; 2]);

impl Pack2 {
    pub fn splat(v: f32) -> Self {
        Self([v, v])
    }

    pub fn new(a: f32, b: f32) -> Self {
        Self([a, b])
    }

    pub fn lane(self, i: usize) -> f32 {
        self.0[i]
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self([f(self.0[0]), f(self.0[1])])
    }

    fn zip(self, rhs: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self([f(self.0[0], rhs.0[0]), f(self.0[1], rhs.0[1])])
    }

    pub fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }

    pub fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }

    pub fn mul(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a * b)
    }

    pub fn div(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a / b)
    }

    pub fn min(self, rhs: Self) -> Self {
        self.zip(rhs, f32::min)
    }

    pub fn max(self, rhs: Self) -> Self {
        self.zip(rhs, f32::max)
    }

    pub fn neg(self) -> Self {
        self.map(|a| -a)
    }

    pub fn abs(self) -> Self {
        self.map(f32::abs)
    }

    pub fn square(self) -> Self {
        self.map(|a| a * a)
    }

    pub fn sqrt(self) -> Self {
        self.map(f32::sqrt)
    }

    pub fn sin(self) -> Self {
        self.map(f32::sin)
    }

    pub fn cos(self) -> Self {
        self.map(f32::cos)
    }

    pub fn asin(self) -> Self {
        self.map(f32::asin)
    }

    pub fn acos(self) -> Self {
        self.map(f32::acos)
    }

    pub fn atan(self) -> Self {
        self.map(f32::atan)
    }

    pub fn exp(self) -> Self {
        self.map(f32::exp)
    }

    pub fn log(self) -> Self {
        self.map(f32::ln)
    }
}
