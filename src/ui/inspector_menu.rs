use eframe::egui::{self, CollapsingHeader, RichText, ScrollArea, Ui};
use tracing::debug;

use super::common::{create_frame, UiColors};
use crate::inspector::element::{DataFormat, ElementPath};
use crate::inspector::expansion::ExpansionState;
use crate::inspector::inspector_handle::{InspectorCommand, InspectorHandle};
use crate::inspector::model::InspectorModel;

/// Datenstruktur für die Geräteansicht
pub struct InspectorMenuData {
    handle: InspectorHandle,
    model: InspectorModel,
    expansion: ExpansionState,
    shown_generation: u64,
}

impl InspectorMenuData {
    pub fn new(handle: InspectorHandle) -> Self {
        let model = handle.snapshot();
        Self {
            shown_generation: model.generation(),
            handle,
            model,
            expansion: ExpansionState::default(),
        }
    }

    /// Picks up the latest snapshot; a rebuilt tree collapses every group
    pub fn refresh(&mut self) {
        if !self.handle.has_changed() {
            return;
        }
        self.model = self.handle.snapshot();
        if self.model.generation() != self.shown_generation {
            debug!("Inspector tree rebuilt, collapsing groups");
            self.shown_generation = self.model.generation();
            self.expansion.collapse_all();
        }
        self.expansion.clamp(self.model.group_count());
    }

    pub fn device_header(&self, ui: &mut Ui) {
        match self.model.device() {
            Some(device) => {
                ui.heading(device.display_name());
                if let Some(uuid) = device.first_uuid() {
                    ui.label(RichText::new(uuid.to_string()).color(UiColors::MUTED));
                }
            }
            None => {
                ui.heading("No device");
            }
        }
    }

    /// Rendert die Service-Liste
    pub fn render(&mut self, ui: &mut Ui) {
        let group_count = self.model.group_count();
        if group_count == 0 {
            ui.label("Waiting for services...");
            return;
        }

        let model = &self.model;
        let expansion = &mut self.expansion;
        let handle = &self.handle;

        ScrollArea::vertical().auto_shrink(false).show(ui, |ui| {
            for group in 0..group_count {
                let Some(service) = model.group(group) else {
                    continue;
                };
                let response = CollapsingHeader::new(RichText::new(service.label()).strong())
                    .id_salt(service.key)
                    .open(Some(expansion.is_expanded(group)))
                    .show(ui, |ui| {
                        for (child, characteristic) in model.children(group).iter().enumerate() {
                            create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
                                element_row(ui, model, characteristic, handle);
                                let descriptors = model.descriptors(group, child);
                                if !descriptors.is_empty() {
                                    ui.indent(characteristic.key, |ui| {
                                        for descriptor in descriptors {
                                            element_row(ui, model, descriptor, handle);
                                        }
                                    });
                                }
                            });
                        }
                    });

                if response.header_response.clicked() {
                    expansion.toggle(group, group_count);
                }
            }
        });
    }
}

/// Name (click for UUID), value and a text/hex switch
fn element_row(ui: &mut Ui, model: &InspectorModel, path: &ElementPath, handle: &InspectorHandle) {
    ui.horizontal(|ui| {
        let name = ui.add(egui::Label::new(path.label()).sense(egui::Sense::click()));
        if name.clicked() {
            handle.send(InspectorCommand::ToggleName(path.key));
        }

        if let Some(value) = model.value_text(path) {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let switch = match path.data_format {
                    DataFormat::Text => "Aa",
                    DataFormat::Hex => "0x",
                };
                if ui.small_button(switch).clicked() {
                    handle.send(InspectorCommand::ToggleFormat(path.key));
                }
                ui.label(RichText::new(value).monospace());
            });
        }
    });
}
