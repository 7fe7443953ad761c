/// Arrow and color-bar geometry used when building plots.
#[derive(Debug, Clone)]
pub struct PlotSettings {
    /// Data units of field magnitude per axes width, as a quiver `scale`.
    pub scale_2d: f64,
    pub shaft_width_2d: f32,
    /// Head length as a fraction of the arrow length.
    pub head_ratio_2d: f64,
    /// Spread of each head barb from the shaft, radians.
    pub head_angle: f64,
    /// Every 3D arrow is drawn with this length regardless of magnitude.
    pub length_3d: f64,
    pub head_ratio_3d: f64,
    pub line_width_3d: f32,
    /// Default view, degrees.
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub colorbar_ticks: usize,
    pub colorbar_steps: usize,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            scale_2d: 25.0,
            shaft_width_2d: 1.5,
            head_ratio_2d: 0.3,
            head_angle: 0.45,
            length_3d: 0.6,
            head_ratio_3d: 0.35,
            line_width_3d: 1.3,
            azimuth_deg: -60.0,
            elevation_deg: 30.0,
            colorbar_ticks: 6,
            colorbar_steps: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub size: [f32; 2],
    pub colorbar_width: f32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Vector Field 2D / 3D".to_string(),
            size: [900.0, 700.0],
            colorbar_width: 90.0,
        }
    }
}
