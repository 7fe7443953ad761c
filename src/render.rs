//! Builds arrow plots from evaluated fields into a retained [`Surface`].

use egui::Color32;
use nalgebra as na;

use crate::colormap::Normalize;
use crate::config::PlotSettings;
use crate::error::RenderError;
use crate::field::{Field, FieldExpressions};
use crate::mesh::{Grid, Mode, RANGE_2D, RANGE_3D};

pub const COLORBAR_LABEL: &str = "Magnitude";

#[derive(Debug, Clone, PartialEq)]
pub struct Arrow2 {
    pub tail: [f64; 2],
    pub tip: [f64; 2],
    pub magnitude: f64,
    pub color: Color32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrow3 {
    pub tail: na::Point3<f64>,
    pub tip: na::Point3<f64>,
    pub magnitude: f64,
    pub color: Color32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plot {
    Planar {
        arrows: Vec<Arrow2>,
        /// Half-width of the sampled square.
        extent: f64,
    },
    Spatial {
        arrows: Vec<Arrow3>,
        extent: f64,
    },
}

impl Plot {
    pub fn title(&self) -> &'static str {
        match self {
            Plot::Planar { .. } => "2D Vector Field",
            Plot::Spatial { .. } => "3D Vector Field",
        }
    }

    pub fn axis_labels(&self) -> &'static [&'static str] {
        match self {
            Plot::Planar { .. } => &["x", "y"],
            Plot::Spatial { .. } => &["x", "y", "z"],
        }
    }

    pub fn arrow_count(&self) -> usize {
        match self {
            Plot::Planar { arrows, .. } => arrows.len(),
            Plot::Spatial { arrows, .. } => arrows.len(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Plot::Planar { .. } => Mode::TwoD,
            Plot::Spatial { .. } => Mode::ThreeD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorBar {
    pub label: &'static str,
    pub norm: Normalize,
    /// Which render attached this bar.
    pub generation: u64,
}

impl ColorBar {
    /// `count` evenly spaced values from the bottom to the top of the bar.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![self.norm.vmin],
            _ => (0..count)
                .map(|i| self.norm.value_at(i as f64 / (count - 1) as f64))
                .collect(),
        }
    }
}

/// The drawing context owned by the window: at most one plot and one color
/// bar, replaced in place on every render.
#[derive(Debug, Default)]
pub struct Surface {
    plot: Option<Plot>,
    colorbar: Option<ColorBar>,
    generation: u64,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.plot = None;
        self.colorbar = None;
    }

    pub fn is_blank(&self) -> bool {
        self.plot.is_none() && self.colorbar.is_none()
    }

    pub fn plot(&self) -> Option<&Plot> {
        self.plot.as_ref()
    }

    pub fn colorbar(&self) -> Option<&ColorBar> {
        self.colorbar.as_ref()
    }

    /// Number of successful renders so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn commit(&mut self, plot: Plot, norm: Normalize) {
        self.generation += 1;
        if let Some(previous) = self.colorbar.take() {
            log::debug!("removed color bar from render #{}", previous.generation);
        }
        self.plot = Some(plot);
        self.colorbar = Some(ColorBar {
            label: COLORBAR_LABEL,
            norm,
            generation: self.generation,
        });
    }
}

/// Orthographic camera for the 3D plot, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub azimuth: f64,
    pub elevation: f64,
}

impl View {
    pub fn from_degrees(azimuth: f64, elevation: f64) -> Self {
        Self {
            azimuth: azimuth.to_radians(),
            elevation: elevation.to_radians(),
        }
    }

    /// Rows are screen right, screen up and depth towards the viewer.
    pub fn matrix(&self) -> na::Matrix3<f64> {
        let (sa, ca) = self.azimuth.sin_cos();
        let (se, ce) = self.elevation.sin_cos();
        na::Matrix3::new(
            -sa, ca, 0.0, //
            -se * ca, -se * sa, ce, //
            ce * ca, ce * sa, se,
        )
    }

    /// Screen position and depth. Larger depth is closer to the viewer.
    pub fn project(&self, p: &na::Point3<f64>) -> (na::Point2<f64>, f64) {
        let v = self.matrix() * p.coords;
        (na::Point2::new(v.x, v.y), v.z)
    }

    /// Dragging by `(dx, dy)` radians spins around z and tilts, with the tilt
    /// kept short of the poles.
    pub fn rotate(&mut self, dx: f64, dy: f64) {
        let limit = std::f64::consts::FRAC_PI_2 - 0.01;
        self.azimuth -= dx;
        self.elevation = (self.elevation + dy).clamp(-limit, limit);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedArrow {
    pub tail: [f64; 2],
    pub tip: [f64; 2],
    pub depth: f64,
    pub color: Color32,
}

/// Projects 3D arrows and orders them back to front for painting.
pub fn project_arrows(arrows: &[Arrow3], view: &View) -> Vec<ProjectedArrow> {
    let mut projected: Vec<ProjectedArrow> = arrows
        .iter()
        .map(|arrow| {
            let (tail, depth_tail) = view.project(&arrow.tail);
            let (tip, depth_tip) = view.project(&arrow.tip);
            ProjectedArrow {
                tail: [tail.x, tail.y],
                tip: [tip.x, tip.y],
                depth: 0.5 * (depth_tail + depth_tip),
                color: arrow.color,
            }
        })
        .collect();
    projected.sort_by(|a, b| a.depth.total_cmp(&b.depth));
    projected
}

/// The 12 edges of the cube `[-extent, extent]^3`.
pub fn cube_edges(extent: f64) -> Vec<(na::Point3<f64>, na::Point3<f64>)> {
    let corner = |i: usize| {
        let pick = |bit: usize| if i & bit != 0 { extent } else { -extent };
        na::Point3::new(pick(1), pick(2), pick(4))
    };
    let mut edges = Vec::with_capacity(12);
    for i in 0..8 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                edges.push((corner(i), corner(i | bit)));
            }
        }
    }
    edges
}

/// The two barbs of an arrow head ending at `tip`, or `None` for a
/// zero-length arrow.
pub fn arrow_head(tail: [f64; 2], tip: [f64; 2], ratio: f64, spread: f64) -> Option<[[f64; 2]; 2]> {
    let dx = tip[0] - tail[0];
    let dy = tip[1] - tail[1];
    let length = dx.hypot(dy);
    if length == 0.0 || !length.is_finite() {
        return None;
    }

    let head = length * ratio;
    let angle = dy.atan2(dx);
    let barb = |offset: f64| {
        [
            tip[0] - head * (angle + offset).cos(),
            tip[1] - head * (angle + offset).sin(),
        ]
    };
    Some([barb(spread), barb(-spread)])
}

pub struct FieldRenderer {
    settings: PlotSettings,
}

impl FieldRenderer {
    pub fn new(settings: PlotSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlotSettings {
        &self.settings
    }

    /// Clears `surface`, then samples, evaluates and draws the field for
    /// `mode`. On failure the surface is left blank.
    pub fn render(
        &self,
        surface: &mut Surface,
        mode: Mode,
        expressions: &FieldExpressions,
    ) -> Result<(), RenderError> {
        surface.clear();

        let grid = Grid::for_mode(mode);
        let field = expressions.evaluate(&grid)?;
        match mode {
            Mode::TwoD => self.draw_planar(surface, &grid, &field),
            Mode::ThreeD => self.draw_spatial(surface, &grid, &field),
        }
    }

    pub fn draw_planar(
        &self,
        surface: &mut Surface,
        grid: &Grid,
        field: &Field,
    ) -> Result<(), RenderError> {
        let magnitude = field.magnitude();
        // quiver-style scale: a magnitude of `scale` spans the full axis width
        let length = 2.0 * RANGE_2D / self.settings.scale_2d;

        let mut masked = 0usize;
        let mut arrows = Vec::with_capacity(grid.len());
        for ((((&x, &y), &u), &v), &m) in grid
            .x
            .iter()
            .zip(&grid.y)
            .zip(field.u())
            .zip(field.v())
            .zip(&magnitude)
        {
            if !(u.is_finite() && v.is_finite() && m.is_finite()) {
                masked += 1;
                continue;
            }
            arrows.push(Arrow2 {
                tail: [x, y],
                tip: [x + u * length, y + v * length],
                magnitude: m,
                color: Color32::TRANSPARENT,
            });
        }

        let norm = Self::normalize(arrows.iter().map(|a| &a.magnitude), masked)?;
        for arrow in &mut arrows {
            arrow.color = norm.color(arrow.magnitude);
        }

        log::info!(
            "2D field: {} arrows, magnitude {:.3e}..{:.3e}",
            arrows.len(),
            norm.vmin,
            norm.vmax
        );
        surface.commit(
            Plot::Planar {
                arrows,
                extent: RANGE_2D,
            },
            norm,
        );
        Ok(())
    }

    pub fn draw_spatial(
        &self,
        surface: &mut Surface,
        grid: &Grid,
        field: &Field,
    ) -> Result<(), RenderError> {
        let magnitude = field.magnitude();
        let flat = || ndarray::ArrayD::zeros(grid.x.raw_dim());
        let z = grid.z.clone().unwrap_or_else(flat);
        let w = field.w().cloned().unwrap_or_else(flat);

        let mut masked = 0usize;
        let mut arrows = Vec::with_capacity(grid.len());
        let positions = grid.x.iter().zip(&grid.y).zip(&z);
        let vectors = field.u().iter().zip(field.v()).zip(&w);
        for ((((&x, &y), &z), ((&u, &v), &w)), &m) in positions.zip(vectors).zip(&magnitude) {
            if !(u.is_finite() && v.is_finite() && w.is_finite() && m.is_finite()) {
                masked += 1;
                continue;
            }
            let tail = na::Point3::new(x, y, z);
            let direction = na::Vector3::new(u, v, w);
            // every arrow gets the same length; a zero vector has no direction
            let tip = match direction.try_normalize(0.0) {
                Some(unit) => tail + unit * self.settings.length_3d,
                None => tail,
            };
            arrows.push(Arrow3 {
                tail,
                tip,
                magnitude: m,
                color: Color32::TRANSPARENT,
            });
        }

        let norm = Self::normalize(arrows.iter().map(|a| &a.magnitude), masked)?;
        for arrow in &mut arrows {
            arrow.color = norm.color(arrow.magnitude);
        }

        log::info!(
            "3D field: {} arrows, magnitude {:.3e}..{:.3e}",
            arrows.len(),
            norm.vmin,
            norm.vmax
        );
        surface.commit(
            Plot::Spatial {
                arrows,
                extent: RANGE_3D,
            },
            norm,
        );
        Ok(())
    }

    fn normalize<'a>(
        magnitudes: impl Iterator<Item = &'a f64>,
        masked: usize,
    ) -> Result<Normalize, RenderError> {
        if masked > 0 {
            log::warn!("{masked} grid points have non-finite components and are not drawn");
        }
        Normalize::spanning(magnitudes).ok_or(RenderError::NoFiniteVectors)
    }
}

impl Default for FieldRenderer {
    fn default() -> Self {
        Self::new(PlotSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_top_view_is_xy_plane() {
        let view = View::from_degrees(-90.0, 90.0);
        let (screen, depth) = view.project(&na::Point3::new(1.0, 2.0, 3.0));
        assert!(close(screen.x, 1.0));
        assert!(close(screen.y, 2.0));
        assert!(close(depth, 3.0));
    }

    #[test]
    fn test_view_matrix_is_rotation() {
        let m = View::from_degrees(-60.0, 30.0).matrix();
        let identity = m * m.transpose();
        assert!((identity - na::Matrix3::identity()).norm() < 1e-12);
        assert!(close(m.determinant(), 1.0));
    }

    #[test]
    fn test_rotate_clamps_elevation() {
        let mut view = View::from_degrees(0.0, 80.0);
        view.rotate(0.0, 10.0);
        assert!(view.elevation < std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_projection_sorted_back_to_front() {
        let arrow = |z: f64| Arrow3 {
            tail: na::Point3::new(0.0, 0.0, z),
            tip: na::Point3::new(0.0, 0.0, z),
            magnitude: 1.0,
            color: Color32::WHITE,
        };
        let view = View::from_degrees(-90.0, 90.0);
        let projected = project_arrows(&[arrow(2.0), arrow(-1.0), arrow(0.5)], &view);
        let depths: Vec<f64> = projected.iter().map(|p| p.depth).collect();
        assert_eq!(depths, vec![-1.0, 0.5, 2.0]);
    }

    #[test]
    fn test_cube_has_twelve_unit_edges() {
        let edges = cube_edges(3.0);
        assert_eq!(edges.len(), 12);
        assert!(edges.iter().all(|(a, b)| close((b - a).norm(), 6.0)));
    }

    #[test]
    fn test_arrow_head_barbs_behind_tip() {
        let [left, right] = arrow_head([0.0, 0.0], [1.0, 0.0], 0.3, 0.5).unwrap();
        assert!(left[0] < 1.0 && right[0] < 1.0);
        assert!(close(left[1], -right[1]));
        assert!(arrow_head([1.0, 1.0], [1.0, 1.0], 0.3, 0.5).is_none());
    }

    #[test]
    fn test_colorbar_ticks_span_range() {
        let bar = ColorBar {
            label: COLORBAR_LABEL,
            norm: Normalize::new(0.0, 10.0),
            generation: 1,
        };
        assert_eq!(bar.ticks(3), vec![0.0, 5.0, 10.0]);
        assert_eq!(bar.ticks(1), vec![0.0]);
        assert!(bar.ticks(0).is_empty());
    }

    #[test]
    fn test_commit_replaces_colorbar() {
        let mut surface = Surface::new();
        let plot = Plot::Planar {
            arrows: Vec::new(),
            extent: RANGE_2D,
        };
        surface.commit(plot.clone(), Normalize::new(0.0, 1.0));
        surface.commit(plot, Normalize::new(2.0, 3.0));
        let bar = surface.colorbar().unwrap();
        assert_eq!(bar.generation, 2);
        assert_eq!(bar.norm, Normalize::new(2.0, 3.0));
    }
}
