use ndarray::{Array1, ArrayD, IxDyn};

use crate::expr::Scope;

/// Sampling policy per mode: symmetric range half-width and points per axis.
pub const RANGE_2D: f64 = 5.0;
pub const SAMPLES_2D: usize = 20;
pub const RANGE_3D: f64 = 3.0;
pub const SAMPLES_3D: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    TwoD,
    ThreeD,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::TwoD, Mode::ThreeD];

    pub fn label(self) -> &'static str {
        match self {
            Mode::TwoD => "2D",
            Mode::ThreeD => "3D",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Coordinate arrays for one render, all of the same shape.
#[derive(Debug, Clone)]
pub struct Grid {
    pub mode: Mode,
    pub x: ArrayD<f64>,
    pub y: ArrayD<f64>,
    /// Only present in 3D.
    pub z: Option<ArrayD<f64>>,
}

impl Grid {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::TwoD => Self::planar(),
            Mode::ThreeD => Self::spatial(),
        }
    }

    /// 20 x 20 samples over [-5, 5]^2.
    pub fn planar() -> Self {
        let axis = linspace(-RANGE_2D, RANGE_2D, SAMPLES_2D);
        let n = SAMPLES_2D;
        // "xy" indexing: rows follow y, columns follow x
        let x = ArrayD::from_shape_fn(IxDyn(&[n, n]), |idx| axis[idx[1]]);
        let y = ArrayD::from_shape_fn(IxDyn(&[n, n]), |idx| axis[idx[0]]);
        Self {
            mode: Mode::TwoD,
            x,
            y,
            z: None,
        }
    }

    /// 8 x 8 x 8 samples over [-3, 3]^3.
    pub fn spatial() -> Self {
        let axis = linspace(-RANGE_3D, RANGE_3D, SAMPLES_3D);
        let n = SAMPLES_3D;
        let shape = IxDyn(&[n, n, n]);
        let x = ArrayD::from_shape_fn(shape.clone(), |idx| axis[idx[1]]);
        let y = ArrayD::from_shape_fn(shape.clone(), |idx| axis[idx[0]]);
        let z = ArrayD::from_shape_fn(shape, |idx| axis[idx[2]]);
        Self {
            mode: Mode::ThreeD,
            x,
            y,
            z: Some(z),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.x.shape()
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Binds `x`, `y` and, in 3D, `z` for expression evaluation.
    pub fn scope(&self) -> Scope<'_> {
        let scope = Scope::new().bind("x", &self.x).bind("y", &self.y);
        match &self.z {
            Some(z) => scope.bind("z", z),
            None => scope,
        }
    }
}

/// `n` evenly spaced samples over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Array1<f64> {
    match n {
        0 => Array1::zeros(0),
        1 => Array1::from_elem(1, start),
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            // pin the last sample so it is exactly `stop`
            Array1::from_shape_fn(n, |i| if i == n - 1 { stop } else { start + step * i as f64 })
        }
    }
}
