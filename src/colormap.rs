use egui::Color32;

/// Plasma color stops, sampled at 0.0, 0.25, 0.5, 0.75 and 1.0.
/// Deep indigo -> purple -> magenta -> orange -> yellow
pub(crate) const PLASMA_STOPS: [(f64, f64, f64); 5] = [
    (13.0, 8.0, 135.0),   // #0d0887 indigo   (0.00)
    (126.0, 3.0, 168.0),  // #7e03a8 purple   (0.25)
    (204.0, 71.0, 120.0), // #cc4778 magenta  (0.50)
    (248.0, 149.0, 64.0), // #f89540 orange   (0.75)
    (240.0, 249.0, 33.0), // #f0f921 yellow   (1.00)
];

/// Convert a [0.0, 1.0] value to a plasma color. Out-of-range input is clamped
/// and NaN maps to the low end.
pub fn plasma(t: f64) -> Color32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let seg = t * 4.0;
    let i = (seg as usize).min(3);
    let s = seg - i as f64;

    let (r0, g0, b0) = PLASMA_STOPS[i];
    let (r1, g1, b1) = PLASMA_STOPS[i + 1];

    Color32::from_rgb(
        (r0 + s * (r1 - r0)).round() as u8,
        (g0 + s * (g1 - g0)).round() as u8,
        (b0 + s * (b1 - b0)).round() as u8,
    )
}

/// Linear map from `[vmin, vmax]` onto `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub vmin: f64,
    pub vmax: f64,
}

impl Normalize {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self { vmin, vmax }
    }

    /// Spans the finite values of `values`. `None` if there are none.
    pub fn spanning<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<Self> {
        values
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some(Self::new(v, v)),
                Some(n) => Some(Self::new(n.vmin.min(v), n.vmax.max(v))),
            })
    }

    /// A collapsed range maps everything to 0.0.
    pub fn apply(&self, v: f64) -> f64 {
        let span = self.vmax - self.vmin;
        if span <= 0.0 {
            return 0.0;
        }
        (v - self.vmin) / span
    }

    /// Inverse of [`Normalize::apply`], used for color-bar tick values.
    pub fn value_at(&self, t: f64) -> f64 {
        self.vmin + t * (self.vmax - self.vmin)
    }

    pub fn color(&self, v: f64) -> Color32 {
        plasma(self.apply(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plasma_ends() {
        assert_eq!(plasma(0.0), Color32::from_rgb(13, 8, 135));
        assert_eq!(plasma(1.0), Color32::from_rgb(240, 249, 33));
    }

    #[test]
    fn test_plasma_mid_is_magenta() {
        assert_eq!(plasma(0.5), Color32::from_rgb(204, 71, 120));
    }

    #[test]
    fn test_plasma_clamp() {
        assert_eq!(plasma(-1.0), plasma(0.0));
        assert_eq!(plasma(2.0), plasma(1.0));
        assert_eq!(plasma(f64::NAN), plasma(0.0));
    }

    #[test]
    fn test_normalize_linear() {
        let norm = Normalize::new(2.0, 6.0);
        assert_eq!(norm.apply(2.0), 0.0);
        assert_eq!(norm.apply(4.0), 0.5);
        assert_eq!(norm.apply(6.0), 1.0);
        assert_eq!(norm.value_at(0.25), 3.0);
    }

    #[test]
    fn test_normalize_collapsed_range() {
        let norm = Normalize::new(1e-9, 1e-9);
        assert_eq!(norm.apply(1e-9), 0.0);
        assert!(!norm.apply(5.0).is_nan());
    }

    #[test]
    fn test_spanning_skips_non_finite() {
        let values = [3.0, f64::NAN, -1.0, f64::INFINITY, 7.0];
        assert_eq!(Normalize::spanning(&values), Some(Normalize::new(-1.0, 7.0)));
        assert_eq!(Normalize::spanning(&[f64::NAN]), None);
    }
}
