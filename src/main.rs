mod api;
mod app;
mod config;
mod models;
mod search;
mod selection;
mod workers;

use api::ApiClient;
use app::DeskApp;
use config::Config;

fn main() -> eframe::Result<()> {
    let config = Config::load();
    let api = match ApiClient::new(&config) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("Não foi possível iniciar o cliente da API: {err}");
            std::process::exit(2);
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1120.0, 760.0])
            .with_min_inner_size([860.0, 560.0])
            .with_resizable(true)
            .with_title("Cobranca Desk"),
        ..Default::default()
    };

    eframe::run_native(
        "Cobranca Desk",
        native_options,
        Box::new(move |cc| Box::new(DeskApp::new(&cc.egui_ctx, config, api))),
    )
}
