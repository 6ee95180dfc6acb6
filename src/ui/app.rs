//! Windowed front end built on eframe/egui.
//!
//! [`PetApp`] is the [`eframe::App`].  Its per-frame `update` is the
//! foreground tick: it drains hotkey commands and window input, runs
//! [`Foreground::tick`], applies script moves with
//! `ViewportCommand::OuterPosition`, then paints the pet and its bubble.
//!
//! | Input          | Command                  |
//! |----------------|--------------------------|
//! | `Space`        | toggle recording         |
//! | `H`            | "hello"                  |
//! | `T`            | "what time is it"        |
//! | `Esc`          | quit                     |
//! | click on pet   | "user clicked me"        |

use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::UiConfig;
use crate::ui::bubble::{Bubble, NotificationSurface, Rect};
use crate::ui::foreground::{Flow, Foreground, PetCommand};

const WINDOW_TITLE: &str = "Desktop Pet";

// ---------------------------------------------------------------------------
// PetApp
// ---------------------------------------------------------------------------

pub struct PetApp {
    foreground: Foreground<Bubble>,
    commands: mpsc::Receiver<PetCommand>,
    last_frame: Instant,
    frame: Duration,
    /// Window top-left last reported to the foreground.
    last_outer: Option<egui::Pos2>,
    closing: bool,
}

impl PetApp {
    pub fn new(
        foreground: Foreground<Bubble>,
        commands: mpsc::Receiver<PetCommand>,
        frame: Duration,
    ) -> Self {
        Self {
            foreground,
            commands,
            last_frame: Instant::now(),
            frame,
            last_outer: None,
            closing: false,
        }
    }

    /// Forward window moves (drags, the OS, our own commands) so scripts
    /// read the real position.
    fn track_window_position(&mut self, ctx: &egui::Context) {
        let Some(outer) = ctx.input(|i| i.viewport().outer_rect) else {
            return;
        };
        if self.last_outer != Some(outer.min) {
            self.last_outer = Some(outer.min);
            self.foreground.note_window_position(outer.min.x, outer.min.y);
        }
    }

    fn poll_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.foreground.handle_command(command);
        }
    }

    fn poll_window_input(&mut self, ctx: &egui::Context) {
        let pressed: Vec<PetCommand> = ctx.input(|i| {
            [
                (egui::Key::Space, PetCommand::ToggleRecording),
                (egui::Key::H, PetCommand::hello()),
                (egui::Key::T, PetCommand::ask_time()),
                (egui::Key::Escape, PetCommand::Quit),
            ]
            .into_iter()
            .filter(|(key, _)| i.key_pressed(*key))
            .map(|(_, command)| command)
            .collect()
        });
        for command in pressed {
            self.foreground.handle_command(command);
        }
    }

    // ── Painting ─────────────────────────────────────────────────────────

    /// Pet square in the lower middle of the window, leaving room above
    /// for the bubble.
    fn pet_rect(panel: egui::Rect) -> egui::Rect {
        let side = panel.width().min(panel.height()) * 0.5;
        let center = egui::pos2(panel.center().x, panel.bottom() - side / 2.0 - 10.0);
        egui::Rect::from_center_size(center, egui::vec2(side, side))
    }

    fn draw_pet(&self, painter: &egui::Painter, rect: egui::Rect) {
        let center = rect.center();
        let radius = rect.width() / 2.0;
        let body = if self.foreground.is_recording() {
            egui::Color32::from_rgb(255, 140, 140)
        } else {
            egui::Color32::from_rgb(250, 210, 120)
        };
        painter.circle_filled(center, radius, body);
        painter.circle_stroke(center, radius, egui::Stroke::new(2.0, egui::Color32::from_gray(60)));

        let eye_dy = -radius * 0.2;
        let eye_dx = radius * 0.35;
        let eye_r = radius * 0.08;
        let ink = egui::Color32::from_gray(40);
        let expression = self.foreground.expression();

        for dx in [-eye_dx, eye_dx] {
            let eye = center + egui::vec2(dx, eye_dy);
            if expression == "happy" {
                // Closed, upturned eyes.
                painter.line_segment(
                    [eye + egui::vec2(-eye_r, eye_r * 0.5), eye],
                    egui::Stroke::new(2.0, ink),
                );
                painter.line_segment(
                    [eye, eye + egui::vec2(eye_r, eye_r * 0.5)],
                    egui::Stroke::new(2.0, ink),
                );
            } else {
                painter.circle_filled(eye, eye_r, ink);
            }
        }

        let mouth_y = radius * 0.3;
        let mouth_w = radius * 0.4;
        let curve = match expression {
            "happy" => radius * 0.15,
            "sad" => -radius * 0.15,
            _ => 0.0,
        };
        let points: Vec<egui::Pos2> = (0..=8)
            .map(|i| {
                let t = i as f32 / 8.0 * 2.0 - 1.0;
                center + egui::vec2(t * mouth_w, mouth_y + curve * (1.0 - t * t))
            })
            .collect();
        painter.add(egui::Shape::line(points, egui::Stroke::new(2.0, ink)));

        if !matches!(expression, "idle" | "happy" | "sad") {
            painter.text(
                rect.center_bottom() + egui::vec2(0.0, -4.0),
                egui::Align2::CENTER_BOTTOM,
                expression,
                egui::FontId::proportional(12.0),
                ink,
            );
        }
    }

    fn draw_bubble(&self, painter: &egui::Painter) {
        let bubble = self.foreground.surface();
        let (Some(text), Some(frame)) = (bubble.message(), bubble.frame()) else {
            return;
        };
        let rect = to_egui(frame);

        // Fade out over the last half second.
        let remaining = (bubble.display_secs() - bubble.elapsed()).clamp(0.0, 0.5) / 0.5;
        let alpha = (remaining * 235.0) as u8;

        painter.rect_filled(rect, 10.0, egui::Color32::from_white_alpha(alpha));
        let galley = painter.layout(
            text.to_owned(),
            egui::FontId::proportional(16.0),
            egui::Color32::from_black_alpha(alpha),
            rect.width() - 40.0,
        );
        let pos = rect.center() - galley.size() / 2.0;
        painter.galley(pos, galley, egui::Color32::BLACK);
    }
}

fn to_rect(r: egui::Rect) -> Rect {
    Rect::new(r.min.x, r.min.y, r.width(), r.height())
}

fn to_egui(r: Rect) -> egui::Rect {
    egui::Rect::from_min_size(egui::pos2(r.x, r.y), egui::vec2(r.width, r.height))
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for PetApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.poll_commands();
        self.poll_window_input(ctx);
        self.track_window_position(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::new())
            .show(ctx, |ui| {
                let panel = ui.max_rect();
                let pet = Self::pet_rect(panel);

                self.foreground
                    .surface_mut()
                    .set_bounds(Some(to_rect(panel)));
                self.foreground.set_anchor(to_rect(pet));

                let response = ui.allocate_rect(pet, egui::Sense::click_and_drag());
                if response.clicked() {
                    self.foreground.handle_command(PetCommand::poke());
                }
                if response.drag_started() {
                    // Undecorated window: the pet is the title bar.
                    ctx.send_viewport_cmd(egui::ViewportCommand::StartDrag);
                }

                let flow = self.foreground.tick(dt);
                if let Some((x, y)) = self.foreground.take_pending_move() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(egui::pos2(
                        x, y,
                    )));
                }
                if flow == Flow::Exit && !self.closing {
                    self.closing = true;
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }

                let painter = ui.painter();
                self.draw_pet(painter, pet);
                self.draw_bubble(painter);
            });

        // Workers push events at any time; keep polling.
        ctx.request_repaint_after(self.frame);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("foreground: pet window closing");
    }
}

// ---------------------------------------------------------------------------
// run_windowed
// ---------------------------------------------------------------------------

fn native_options(ui: &UiConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_title(WINDOW_TITLE)
        .with_decorations(false)
        .with_transparent(true)
        .with_inner_size([ui.window_size.0, ui.window_size.1])
        .with_resizable(false);
    if ui.always_on_top {
        vp = vp.with_always_on_top();
    }
    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

/// Run the pet window on the calling thread until it closes.
pub fn run_windowed(
    foreground: Foreground<Bubble>,
    commands: mpsc::Receiver<PetCommand>,
    ui: &UiConfig,
) -> anyhow::Result<()> {
    let app = PetApp::new(foreground, commands, Duration::from_millis(ui.frame_ms));
    eframe::run_native(
        WINDOW_TITLE,
        native_options(ui),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("pet window failed: {e}"))
}
