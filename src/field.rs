use ndarray::{ArrayD, Zip};

use crate::error::{ExprError, RenderError};
use crate::expr;
use crate::mesh::{Grid, Mode};

/// Stand-in for an exactly zero magnitude, keeps color normalization defined.
pub const MAGNITUDE_EPSILON: f64 = 1e-9;

/// The three component expressions as typed by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldExpressions {
    pub u: String,
    pub v: String,
    pub w: String,
}

impl FieldExpressions {
    pub fn new(u: impl Into<String>, v: impl Into<String>, w: impl Into<String>) -> Self {
        Self {
            u: u.into(),
            v: v.into(),
            w: w.into(),
        }
    }

    /// W is optional: a blank entry means a flat `0` component.
    pub fn w_or_zero(&self) -> &str {
        if self.w.trim().is_empty() {
            "0"
        } else {
            &self.w
        }
    }

    /// Evaluates the components the grid's mode needs. W is ignored in 2D.
    pub fn evaluate(&self, grid: &Grid) -> Result<Field, RenderError> {
        let scope = grid.scope();
        let shape = grid.shape();
        let component = |name: &'static str, source: &str| {
            expr::evaluate(source, &scope, shape).map_err(RenderError::in_component(name))
        };

        let u = component("U", &self.u)?;
        let v = component("V", &self.v)?;
        let w = match grid.mode {
            Mode::TwoD => None,
            Mode::ThreeD => Some(component("W", self.w_or_zero())?),
        };

        Field::new(u, v, w).map_err(RenderError::in_component("field"))
    }
}

/// Evaluated field components, all of one shape.
#[derive(Debug, Clone)]
pub struct Field {
    u: ArrayD<f64>,
    v: ArrayD<f64>,
    w: Option<ArrayD<f64>>,
}

impl Field {
    pub fn new(u: ArrayD<f64>, v: ArrayD<f64>, w: Option<ArrayD<f64>>) -> Result<Self, ExprError> {
        for other in std::iter::once(&v).chain(w.as_ref()) {
            if other.shape() != u.shape() {
                return Err(ExprError::ShapeMismatch {
                    expected: u.shape().to_vec(),
                    found: other.shape().to_vec(),
                });
            }
        }
        Ok(Self { u, v, w })
    }

    pub fn u(&self) -> &ArrayD<f64> {
        &self.u
    }

    pub fn v(&self) -> &ArrayD<f64> {
        &self.v
    }

    pub fn w(&self) -> Option<&ArrayD<f64>> {
        self.w.as_ref()
    }

    /// Elementwise Euclidean norm with exact zeros floored to
    /// [`MAGNITUDE_EPSILON`].
    pub fn magnitude(&self) -> ArrayD<f64> {
        // hypot keeps the norm finite where squaring would overflow
        let mut norm = Zip::from(&self.u).and(&self.v).map_collect(|&u, &v| u.hypot(v));
        if let Some(w) = &self.w {
            Zip::from(&mut norm).and(w).for_each(|m, &w| *m = m.hypot(w));
        }
        norm.mapv_into(|m| {
            if m == 0.0 {
                MAGNITUDE_EPSILON
            } else {
                m
            }
        })
    }
}
