use eframe::egui;
use vectorfield::app::VectorFieldApp;
use vectorfield::config::{PlotSettings, WindowSettings};

fn main() -> eframe::Result<()> {
    env_logger::init();

    let window = WindowSettings::default();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(window.size)
            .with_title(window.title.clone()),
        ..Default::default()
    };

    let title = window.title.clone();
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Box::new(VectorFieldApp::new(cc, window, PlotSettings::default())))
    )
}
