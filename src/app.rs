use eframe::egui;
use egui_plot::Line;
use nalgebra as na;

use crate::colormap::plasma;
use crate::config::{PlotSettings, WindowSettings};
use crate::field::FieldExpressions;
use crate::mesh::Mode;
use crate::render::{
    arrow_head, cube_edges, project_arrows, Arrow2, Arrow3, ColorBar, FieldRenderer, Plot, Surface,
    View,
};

const TRIGGER_GREEN: egui::Color32 = egui::Color32::from_rgb(0x4C, 0xAF, 0x50);
const BOX_GRAY: egui::Color32 = egui::Color32::from_gray(0xCC);

/// Radians of view rotation per dragged point.
const DRAG_SENSITIVITY: f64 = 0.01;

pub struct VectorFieldApp {
    expressions: FieldExpressions,
    mode: Mode,
    renderer: FieldRenderer,
    surface: Surface,
    view: View,
    window: WindowSettings,
    /// Message of the last failed render, shown modally until dismissed.
    error: Option<String>,
}

impl VectorFieldApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        window: WindowSettings,
        plot: PlotSettings,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let view = View::from_degrees(plot.azimuth_deg, plot.elevation_deg);
        Self {
            expressions: FieldExpressions::default(),
            mode: Mode::default(),
            renderer: FieldRenderer::new(plot),
            surface: Surface::new(),
            view,
            window,
            error: None,
        }
    }

    fn plot_field(&mut self) {
        let result = self.renderer.render(&mut self.surface, self.mode, &self.expressions);
        if let Err(err) = result {
            log::error!("render failed: {err}");
            self.error = Some(err.to_string());
        }
    }

    fn show_inputs(&mut self, ui: &mut egui::Ui) {
        let mut submitted = false;

        ui.horizontal(|ui| {
            let width = ((ui.available_width() - 90.0) / 3.0).max(80.0);
            let fields = [
                (&mut self.expressions.u, "U(x, y[, z])"),
                (&mut self.expressions.v, "V(x, y[, z])"),
                (&mut self.expressions.w, "W(x, y, z) - optional"),
            ];
            for (text, hint) in fields {
                let response = ui.add(
                    egui::TextEdit::singleline(text)
                        .hint_text(hint)
                        .desired_width(width),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submitted = true;
                }
            }

            egui::ComboBox::from_id_source("mode")
                .selected_text(self.mode.label())
                .show_ui(ui, |ui| {
                    for mode in Mode::ALL {
                        ui.selectable_value(&mut self.mode, mode, mode.label());
                    }
                });
        });

        let button = egui::Button::new(
            egui::RichText::new("Plot Field")
                .strong()
                .color(egui::Color32::WHITE),
        )
        .fill(TRIGGER_GREEN)
        .min_size(egui::vec2(ui.available_width(), 32.0));

        if ui.add(button).clicked() || submitted {
            self.plot_field();
        }
    }

    fn show_error(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.error else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("An error occurred:\n{message}"));
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    dismissed = ui.button("OK").clicked();
                });
            });

        if dismissed || ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.error = None;
        }
    }
}

impl eframe::App for VectorFieldApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let idle = self.error.is_none();

        egui::TopBottomPanel::top("inputs").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.add_enabled_ui(idle, |ui| self.show_inputs(ui));
            ui.add_space(6.0);
        });

        egui::SidePanel::right("colorbar")
            .exact_width(self.window.colorbar_width)
            .resizable(false)
            .show(ctx, |ui| {
                if let Some(bar) = self.surface.colorbar() {
                    show_colorbar(ui, bar, self.renderer.settings());
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Self {
                surface,
                renderer,
                view,
                ..
            } = self;

            let Some(plot) = surface.plot() else {
                ui.centered_and_justified(|ui| {
                    ui.weak("Enter the field components and press Plot Field");
                });
                return;
            };

            ui.vertical_centered(|ui| ui.heading(plot.title()));
            match plot {
                Plot::Planar { arrows, extent } => {
                    let labels = plot.axis_labels();
                    show_planar(ui, arrows, *extent, labels, renderer.settings());
                }
                Plot::Spatial { arrows, extent } => {
                    let labels = plot.axis_labels();
                    let settings = renderer.settings();
                    show_spatial(ui, arrows, *extent, labels, view, settings, idle);
                }
            }
        });

        self.show_error(ctx);
    }
}

fn show_planar(
    ui: &mut egui::Ui,
    arrows: &[Arrow2],
    extent: f64,
    labels: &[&str],
    settings: &PlotSettings,
) {
    let plot = egui_plot::Plot::new("field_2d")
        .data_aspect(1.0)
        .show_grid(true)
        .x_axis_label(labels[0])
        .y_axis_label(labels[1])
        .include_x(-extent)
        .include_x(extent)
        .include_y(-extent)
        .include_y(extent);

    plot.show(ui, |plot_ui| {
        for arrow in arrows {
            let shaft = Line::new(vec![arrow.tail, arrow.tip])
                .color(arrow.color)
                .width(settings.shaft_width_2d);
            plot_ui.line(shaft);

            let (ratio, angle) = (settings.head_ratio_2d, settings.head_angle);
            if let Some([left, right]) = arrow_head(arrow.tail, arrow.tip, ratio, angle) {
                let head = Line::new(vec![left, arrow.tip, right])
                    .color(arrow.color)
                    .width(settings.shaft_width_2d);
                plot_ui.line(head);
            }
        }
    });
}

fn show_spatial(
    ui: &mut egui::Ui,
    arrows: &[Arrow3],
    extent: f64,
    labels: &[&str],
    view: &mut View,
    settings: &PlotSettings,
    interactive: bool,
) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());
    if interactive && response.dragged() {
        let delta = response.drag_delta();
        view.rotate(delta.x as f64 * DRAG_SENSITIVITY, delta.y as f64 * DRAG_SENSITIVITY);
    }

    let painter = ui.painter_at(rect);
    let scale = rect.width().min(rect.height()) as f64 / (extent * 3.8);
    let to_screen = |p: [f64; 2]| {
        rect.center() + egui::vec2((p[0] * scale) as f32, (-p[1] * scale) as f32)
    };
    let project = |p: &na::Point3<f64>| {
        let (screen, _) = view.project(p);
        to_screen([screen.x, screen.y])
    };

    let box_stroke = egui::Stroke::new(1.0, BOX_GRAY);
    for (a, b) in cube_edges(extent) {
        painter.line_segment([project(&a), project(&b)], box_stroke);
    }

    // labels sit just outside the midpoint of one bottom or side edge per axis
    let out = extent * 1.2;
    let anchors = [
        na::Point3::new(0.0, -out, -extent),
        na::Point3::new(out, 0.0, -extent),
        na::Point3::new(-out, -out, 0.0),
    ];
    let text_color = ui.visuals().text_color();
    for (label, anchor) in labels.iter().zip(&anchors) {
        painter.text(
            project(anchor),
            egui::Align2::CENTER_CENTER,
            *label,
            egui::FontId::proportional(14.0),
            text_color,
        );
    }

    for arrow in project_arrows(arrows, view) {
        let stroke = egui::Stroke::new(settings.line_width_3d, arrow.color);
        let tip = to_screen(arrow.tip);
        painter.line_segment([to_screen(arrow.tail), tip], stroke);
        let head = arrow_head(arrow.tail, arrow.tip, settings.head_ratio_3d, settings.head_angle);
        if let Some([left, right]) = head {
            painter.line_segment([to_screen(left), tip], stroke);
            painter.line_segment([to_screen(right), tip], stroke);
        }
    }
}

fn show_colorbar(ui: &mut egui::Ui, bar: &ColorBar, settings: &PlotSettings) {
    ui.add_space(8.0);
    ui.label(egui::RichText::new(bar.label).strong());

    let height = (ui.available_height() * 0.8).max(60.0);
    let size = egui::vec2(ui.available_width(), height);
    let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
    let strip = egui::Rect::from_min_size(rect.min, egui::vec2(18.0, rect.height()));
    let painter = ui.painter_at(rect);

    let steps = settings.colorbar_steps.max(1);
    for i in 0..steps {
        // low values at the bottom
        let lo = strip.bottom() - (i + 1) as f32 / steps as f32 * strip.height();
        let hi = strip.bottom() - i as f32 / steps as f32 * strip.height();
        let cell =
            egui::Rect::from_min_max(egui::pos2(strip.left(), lo), egui::pos2(strip.right(), hi));
        painter.rect_filled(cell, 0.0, plasma((i as f64 + 0.5) / steps as f64));
    }

    let text_color = ui.visuals().text_color();
    let stroke = egui::Stroke::new(1.0, text_color);
    painter.rect_stroke(strip, 0.0, stroke);

    let ticks = bar.ticks(settings.colorbar_ticks);
    let last = ticks.len().saturating_sub(1).max(1) as f32;
    for (i, value) in ticks.iter().enumerate() {
        let y = strip.bottom() - i as f32 / last * strip.height();
        let tick = [egui::pos2(strip.right(), y), egui::pos2(strip.right() + 4.0, y)];
        painter.line_segment(tick, stroke);
        painter.text(
            egui::pos2(strip.right() + 6.0, y),
            egui::Align2::LEFT_CENTER,
            format_tick(*value),
            egui::FontId::proportional(11.0),
            text_color,
        );
    }
}

fn format_tick(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-2..1e4).contains(&magnitude) {
        format!("{value:.1e}")
    } else {
        format!("{value:.2}")
    }
}
