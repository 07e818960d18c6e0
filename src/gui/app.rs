//! Main GUI Application
//!
//! The NvOcApp struct and eframe::App implementation.

use eframe::egui;
use std::time::Instant;

use crate::command::SharedCommandRunner;
use crate::config::Config;
use crate::panel::{CORE_RANGE, ControlPanel, FAN_RANGE, MEM_RANGE, NoticeKind};
use crate::profiles::DEFAULT_PROFILE;

const TITLE: &str = "NVIDIA GPU Control & Monitor";

/// Open the main window and block until it is closed
pub fn run(config: Config, runner: SharedCommandRunner) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([850.0, 650.0])
            .with_min_inner_size([700.0, 550.0])
            .with_title(TITLE),
        ..Default::default()
    };

    let panel = ControlPanel::from_config(&config, runner);
    eframe::run_native(
        TITLE,
        options,
        Box::new(|_cc| Ok(Box::new(NvOcApp::new(panel)))),
    )
}

pub struct NvOcApp {
    panel: ControlPanel,
    /// Contents of the "new profile" text field
    new_profile_name: String,
    /// Profile awaiting delete confirmation
    confirm_delete: Option<String>,
}

impl NvOcApp {
    pub fn new(panel: ControlPanel) -> Self {
        Self {
            panel,
            new_profile_name: String::new(),
            confirm_delete: None,
        }
    }

    fn render_monitoring(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.strong("Live Monitoring");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.panel.is_monitoring_paused() {
                        "Resume Monitoring"
                    } else {
                        "Pause Monitoring"
                    };
                    if ui.button(label).clicked() {
                        self.panel.toggle_monitoring(now);
                    }
                });
            });
            ui.separator();
            match self.panel.stats() {
                Some(stats) => {
                    ui.monospace(stats.to_string());
                }
                None => {
                    ui.label("Waiting for first reading...");
                }
            }
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui, now: Instant) {
        let enabled = !self.panel.is_busy();

        ui.group(|ui| {
            ui.strong("Overclocking & Fan Control");
            ui.separator();

            egui::Grid::new("oc_sliders")
                .num_columns(2)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Fan Speed (%)");
                    ui.add_enabled(
                        enabled,
                        egui::Slider::new(&mut self.panel.settings.fan_speed, FAN_RANGE),
                    );
                    ui.end_row();

                    ui.label("Core Clock Offset (MHz)");
                    ui.add_enabled(
                        enabled,
                        egui::Slider::new(&mut self.panel.settings.core_offset, CORE_RANGE),
                    );
                    ui.end_row();

                    ui.label("Memory Clock Offset (MHz)");
                    ui.add_enabled(
                        enabled,
                        egui::Slider::new(&mut self.panel.settings.mem_offset, MEM_RANGE),
                    );
                    ui.end_row();
                });

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(enabled, egui::Button::new("Apply Settings"))
                    .clicked()
                {
                    self.panel.request_apply(now);
                }
                if ui
                    .add_enabled(enabled, egui::Button::new("Reset to Defaults"))
                    .clicked()
                {
                    self.panel.request_reset(now);
                }
                if !enabled {
                    ui.spinner();
                    ui.label("Waiting for authorization...");
                }
            });
        });
    }

    fn render_profiles(&mut self, ui: &mut egui::Ui, now: Instant) {
        let enabled = !self.panel.is_busy();

        ui.group(|ui| {
            ui.strong("Profiles");
            ui.separator();

            let mut chosen = None;
            ui.horizontal(|ui| {
                ui.label("Load Profile:");
                ui.add_enabled_ui(enabled, |ui| {
                    egui::ComboBox::from_id_salt("profile_selector")
                        .selected_text(self.panel.selected_profile.clone())
                        .show_ui(ui, |ui| {
                            for name in self.panel.profile_names() {
                                let selected = name == self.panel.selected_profile;
                                if ui.selectable_label(selected, &name).clicked() {
                                    chosen = Some(name);
                                }
                            }
                        });
                });

                let deletable = enabled && self.panel.selected_profile != DEFAULT_PROFILE;
                if ui
                    .add_enabled(deletable, egui::Button::new("Delete Selected"))
                    .clicked()
                {
                    self.confirm_delete = Some(self.panel.selected_profile.clone());
                }
            });
            if let Some(name) = chosen {
                self.panel.select_profile(&name, now);
            }

            ui.horizontal(|ui| {
                ui.label("New Profile Name:");
                ui.text_edit_singleline(&mut self.new_profile_name);
                if ui
                    .add_enabled(enabled, egui::Button::new("Save Current Settings"))
                    .clicked()
                    && self.panel.save_current_as(&self.new_profile_name).is_ok()
                {
                    self.new_profile_name.clear();
                }
            });
        });
    }

    fn render_notices(&mut self, ui: &mut egui::Ui) {
        let mut dismissed = None;
        for (i, notice) in self.panel.notices().enumerate() {
            let color = match notice.kind {
                NoticeKind::Success => egui::Color32::from_rgb(80, 200, 120),
                NoticeKind::Info => egui::Color32::LIGHT_BLUE,
                NoticeKind::Warning => egui::Color32::YELLOW,
                NoticeKind::Error => egui::Color32::from_rgb(230, 80, 80),
            };
            ui.horizontal(|ui| {
                ui.colored_label(color, &notice.message);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("×").clicked() {
                        dismissed = Some(i);
                    }
                });
            });
        }
        if let Some(i) = dismissed {
            self.panel.dismiss_notice(i);
        }
    }

    fn render_delete_confirmation(&mut self, ctx: &egui::Context) {
        let Some(name) = self.confirm_delete.clone() else {
            return;
        };

        let mut answer = None;
        egui::Window::new("Confirm Delete")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Are you sure you want to delete the profile '{name}'?"));
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        answer = Some(false);
                    }
                });
            });

        if let Some(confirmed) = answer {
            self.confirm_delete = None;
            if confirmed {
                let _ = self.panel.delete_profile(&name);
            }
        }
    }
}

impl eframe::App for NvOcApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.panel.tick(now);

        egui::TopBottomPanel::bottom("notices").show(ctx, |ui| {
            self.render_notices(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(TITLE);
            ui.add_space(6.0);
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.render_monitoring(ui, now);
                ui.add_space(8.0);
                self.render_controls(ui, now);
                ui.add_space(8.0);
                self.render_profiles(ui, now);
            });
        });

        self.render_delete_confirmation(ctx);

        if let Some(deadline) = self.panel.next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
    }
}
