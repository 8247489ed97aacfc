use crawl_loom::gui::frontend::CrawlLoomApp;
use crawl_loom::persistence::settings::VizSettings;

use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();
    let settings = VizSettings::load().unwrap_or_else(|e| {
        log::warn!("settings unavailable, using defaults: {:#}", e);
        VizSettings::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            // Keep the tab bar and status line usable on small screens
            .with_min_inner_size([640.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Crawl-Loom",
        options,
        Box::new(move |_cc| Ok(Box::new(CrawlLoomApp::new(settings)) as Box<dyn eframe::App>)),
    )
}
