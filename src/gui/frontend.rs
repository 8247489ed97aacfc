#![allow(clippy::collapsible_if)]
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Stroke, Vec2};
use log::{info, warn};

use crate::dataset::CrawlDataset;
use crate::fetch::FetchRuntime;
use crate::layout::interaction::{PointerEvent, PointerId};
use crate::layout::render::RenderFrame;
use crate::persistence::settings::VizSettings;
use crate::store::GraphStore;
use crate::store::neo4j::Neo4jStore;
use crate::viz::{FetchStatus, Visualization, VizConfig};

// egui reports a single primary pointer
const PRIMARY_POINTER: PointerId = 0;
const NODE_RADIUS: f32 = 7.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tab {
    Graph,
    CrawledUrls,
    Ranking,
    Blacklist,
}

pub struct CrawlLoomApp {
    settings: VizSettings,
    // Declared before `runtime`: dropping the view spawns the store close onto it
    viz: Option<Visualization>,
    runtime: Option<FetchRuntime>,
    tab: Tab,
    dataset: Option<CrawlDataset>,
    notice: Option<String>,
    last_frame: RenderFrame,
    // Whether the primary pointer currently drives a drag session
    pointer_engaged: bool,
}

impl CrawlLoomApp {
    pub fn new(settings: VizSettings) -> Self {
        let mut notice = None;
        let runtime = match FetchRuntime::new() {
            Ok(rt) => Some(rt),
            Err(e) => {
                warn!("fetch runtime unavailable: {:#}", e);
                notice = Some(format!("Fetch runtime unavailable: {:#}", e));
                None
            }
        };
        let dataset = settings.dataset_path.as_deref().and_then(|path| match CrawlDataset::load(path) {
            Ok(ds) => Some(ds),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        });
        let mut app = Self {
            settings,
            viz: None,
            runtime,
            tab: Tab::Graph,
            dataset,
            notice,
            last_frame: RenderFrame::default(),
            pointer_engaged: false,
        };
        app.mount_graph();
        app
    }

    fn select_tab(&mut self, tab: Tab) {
        if tab == self.tab {
            return;
        }
        self.tab = tab;
        if tab == Tab::Graph {
            self.mount_graph();
        } else {
            self.unmount_graph();
        }
    }

    fn mount_graph(&mut self) {
        if self.viz.is_some() {
            return;
        }
        let Some(runtime) = &self.runtime else { return; };
        let connection = match self.settings.connection_config() {
            Ok(c) => c,
            Err(e) => {
                warn!("cannot mount graph view: {:#}", e);
                self.notice = Some(format!("{:#}", e));
                return;
            }
        };
        info!("mounting graph view against {}", connection.uri);
        let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::new(connection));
        let mut viz = Visualization::mount(store, runtime.handle(), VizConfig::from_settings(&self.settings));
        viz.refresh();
        self.notice = None;
        self.viz = Some(viz);
    }

    fn unmount_graph(&mut self) {
        if let Some(viz) = self.viz.take() {
            viz.unmount();
        }
        self.pointer_engaged = false;
        self.last_frame = RenderFrame::default();
    }

    fn status_text(&self) -> String {
        match self.viz.as_ref().map(|v| v.status()) {
            None => "Not connected".to_string(),
            Some(FetchStatus::Idle) => "Idle".to_string(),
            Some(FetchStatus::Loading { generation }) => format!("Loading (fetch #{})...", generation),
            Some(FetchStatus::Ready { nodes, links, dropped_links }) => {
                if *dropped_links > 0 {
                    format!("{} nodes, {} links ({} dangling dropped)", nodes, links, dropped_links)
                } else {
                    format!("{} nodes, {} links", nodes, links)
                }
            }
            Some(FetchStatus::Failed { error }) => format!("Fetch failed: {}", error),
        }
    }

    // Stable color per label, chosen from a small distinct palette via hashing.
    fn color_for_label(label: &str) -> Color32 {
        const PALETTE: [Color32; 8] = [
            Color32::from_rgb(0x7b, 0xa3, 0xff),
            Color32::from_rgb(0xff, 0xa3, 0x7b),
            Color32::from_rgb(0x7b, 0xff, 0xa3),
            Color32::from_rgb(0xff, 0x7b, 0xa3),
            Color32::from_rgb(0xa3, 0x7b, 0xff),
            Color32::from_rgb(0xff, 0xe0, 0x7b),
            Color32::from_rgb(0x7b, 0xe0, 0xff),
            Color32::from_rgb(0x9a, 0xcd, 0x32),
        ];
        if label.is_empty() {
            return Color32::GRAY;
        }
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        label.hash(&mut hasher);
        PALETTE[hasher.finish() as usize % PALETTE.len()]
    }

    fn graph_canvas(&mut self, ui: &mut egui::Ui) {
        let Some(viz) = self.viz.as_mut() else {
            ui.centered_and_justified(|ui| {
                ui.label(self.notice.as_deref().unwrap_or("Graph view unavailable"));
            });
            return;
        };

        let (resp, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = resp.rect;
        let (w, h) = (rect.width() as f64, rect.height() as f64);
        if viz.simulation().viewport() != (w, h) {
            viz.resize(w, h);
        }
        let to_layout = |p: Pos2| ((p.x - rect.min.x) as f64, (p.y - rect.min.y) as f64);
        let to_screen = |x: f64, y: f64| Pos2::new(rect.min.x + x as f32, rect.min.y + y as f32);

        let queue = viz.pointer_queue();
        if resp.drag_started() {
            if let Some(p) = ui.input(|i| i.pointer.press_origin()) {
                let (x, y) = to_layout(p);
                queue.push(PointerEvent::Down { pointer: PRIMARY_POINTER, x, y });
                self.pointer_engaged = true;
            }
        }
        if self.pointer_engaged && resp.dragged() {
            if let Some(p) = ui.input(|i| i.pointer.latest_pos()) {
                let (x, y) = to_layout(p);
                queue.push(PointerEvent::Move { pointer: PRIMARY_POINTER, x, y });
            }
        }
        // Release outside the canvas still ends the drag
        if self.pointer_engaged && (resp.drag_stopped() || !ui.input(|i| i.pointer.any_down())) {
            queue.push(PointerEvent::Up { pointer: PRIMARY_POINTER });
            self.pointer_engaged = false;
        }

        let frame = viz.step();
        let loading = matches!(viz.status(), FetchStatus::Loading { .. });
        let ready = matches!(viz.status(), FetchStatus::Ready { .. });

        painter.rect_filled(rect, 0.0, Color32::from_rgb(24, 24, 28));
        let link_stroke = Stroke::new(1.0, Color32::from_gray(110));
        for line in &frame.lines {
            painter.line_segment([to_screen(line.x1, line.y1), to_screen(line.x2, line.y2)], link_stroke);
        }
        let hover = resp.hover_pos();
        for point in &frame.points {
            let pos = to_screen(point.x, point.y);
            let fill = Self::color_for_label(&point.label);
            let stroke = if point.pinned {
                Stroke::new(2.0, Color32::WHITE)
            } else {
                Stroke::new(1.0, Color32::DARK_GRAY)
            };
            painter.circle_filled(pos, NODE_RADIUS, fill);
            painter.circle_stroke(pos, NODE_RADIUS, stroke);
            let hovered = hover.is_some_and(|h| (h - pos).length() <= NODE_RADIUS * 1.5);
            if hovered || point.pinned {
                let caption = if point.label.is_empty() {
                    point.id.clone()
                } else {
                    format!("{} ({})", point.label, point.id)
                };
                painter.text(
                    pos + Vec2::new(0.0, -NODE_RADIUS - 2.0),
                    Align2::CENTER_BOTTOM,
                    caption,
                    FontId::proportional(12.0),
                    Color32::LIGHT_GRAY,
                );
            }
        }

        if ready && frame.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "The store returned no relationships",
                FontId::proportional(14.0),
                Color32::GRAY,
            );
        }

        if !frame.settled || loading || self.pointer_engaged {
            ui.ctx().request_repaint();
        } else {
            ui.ctx().request_repaint_after(Duration::from_millis(250));
        }
        self.last_frame = frame;
    }

    fn crawled_urls_view(&self, ui: &mut egui::Ui) {
        let Some(ds) = &self.dataset else {
            ui.label("No crawl dataset loaded");
            return;
        };
        ui.heading(format!("Crawled URLs ({})", ds.total_urls_crawled));
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            egui::Grid::new("crawled_urls").striped(true).show(ui, |ui| {
                ui.strong("URL");
                ui.strong("Rank");
                ui.end_row();
                for entry in &ds.data {
                    if ds.is_blacklisted(&entry.url) {
                        ui.colored_label(Color32::from_rgb(0xe0, 0x60, 0x60), &entry.url)
                            .on_hover_text("black-listed");
                    } else {
                        ui.label(&entry.url);
                    }
                    ui.label(format!("{:.4}", entry.rank));
                    ui.end_row();
                }
            });
        });
    }

    fn ranking_view(&self, ui: &mut egui::Ui) {
        let Some(ds) = &self.dataset else {
            ui.label("No crawl dataset loaded");
            return;
        };
        ui.heading("Ranking by in-degree");
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            egui::Grid::new("ranking").striped(true).show(ui, |ui| {
                ui.strong("#");
                ui.strong("URL");
                ui.strong("In-degree");
                ui.end_row();
                for (pos, entry) in ds.ranking().into_iter().enumerate() {
                    ui.label(format!("{}", pos + 1));
                    ui.label(&entry.url);
                    ui.label(format!("{}", entry.in_degree));
                    ui.end_row();
                }
            });
        });
    }

    fn blacklist_view(&self, ui: &mut egui::Ui) {
        let Some(ds) = &self.dataset else {
            ui.label("No crawl dataset loaded");
            return;
        };
        ui.heading("Black-listed URLs");
        if ds.blacklist.is_empty() {
            ui.label("(none)");
            return;
        }
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            for url in &ds.blacklist {
                ui.label(url);
            }
        });
    }
}

impl eframe::App for CrawlLoomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Crawl-Loom");
                ui.separator();
                let mut next = self.tab;
                for (tab, name) in [
                    (Tab::Graph, "Graph"),
                    (Tab::CrawledUrls, "Crawled URLs"),
                    (Tab::Ranking, "Ranking"),
                    (Tab::Blacklist, "Black-listed URLs"),
                ] {
                    if ui.selectable_label(self.tab == tab, name).clicked() {
                        next = tab;
                    }
                }
                self.select_tab(next);
                if self.tab == Tab::Graph {
                    ui.separator();
                    if ui.button("Refresh").clicked() {
                        match self.viz.as_mut() {
                            Some(viz) => {
                                viz.refresh();
                            }
                            None => self.mount_graph(),
                        }
                    }
                }
            });
        });

        if self.tab == Tab::Graph {
            egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.small(self.status_text());
                    ui.separator();
                    ui.small(format!(
                        "tick {} | energy {:.3}{}",
                        self.last_frame.tick,
                        self.last_frame.energy,
                        if self.last_frame.settled { " (settled)" } else { "" }
                    ));
                });
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Graph => self.graph_canvas(ui),
            Tab::CrawledUrls => self.crawled_urls_view(ui),
            Tab::Ranking => self.ranking_view(ui),
            Tab::Blacklist => self.blacklist_view(ui),
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.unmount_graph();
    }
}
