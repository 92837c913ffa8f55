use crate::core::circuit::InputConfig;
use crate::core::{IntFormat, Model};
use imgui::{Condition, Ui};

/// Request raised by the inputs window
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    None,
    /// Open (or focus) the value editor of an input at a screen position
    Edit { name: String, position: [f32; 2] },
}

/// Lists every model input with its current value
pub struct InputListWindow {
    filter: String,
}

impl Default for InputListWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl InputListWindow {
    pub fn new() -> Self {
        Self {
            filter: String::new(),
        }
    }

    /// True if an input name passes the filter box
    pub fn matches_filter(&self, name: &str) -> bool {
        let filter = self.filter.trim();
        filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
    }

    pub fn render(
        &mut self,
        ui: &Ui,
        model: Option<&Model>,
        configs: &[InputConfig],
        is_open: &mut bool,
    ) -> InputAction {
        let mut action = InputAction::None;

        ui.window("Inputs")
            .size([480.0, 320.0], Condition::FirstUseEver)
            .position([20.0, 40.0], Condition::FirstUseEver)
            .opened(is_open)
            .build(|| {
                let Some(model) = model else {
                    ui.text_colored([0.6, 0.6, 0.6, 1.0], "Simulation stopped");
                    ui.text("Start it from the Simulation menu (F5)");
                    return;
                };

                ui.text("Filter:");
                ui.same_line();
                ui.input_text("##filter", &mut self.filter).build();
                ui.separator();

                // Header row
                ui.text_colored([0.7, 0.7, 0.7, 1.0], format!("{:<12} {:>4}  {}", "Name", "Bits", "Value"));
                ui.separator();

                for input in model.inputs() {
                    if !self.matches_filter(input.name()) {
                        continue;
                    }
                    let format = configs
                        .iter()
                        .find(|c| c.name == input.name())
                        .map(|c| c.format)
                        .unwrap_or(IntFormat::Def);

                    if ui.small_button(format!("Edit##{}", input.name())) {
                        action = InputAction::Edit {
                            name: input.name().to_string(),
                            position: ui.io().mouse_pos,
                        };
                    }
                    ui.same_line();
                    let name: String = input.name().chars().take(12).collect();
                    ui.text(format!("{:<12} {:>4}  {}", name, input.bits(), format.format_to_edit(&input.get_copy())));
                    if ui.is_item_hovered() {
                        ui.tooltip(|| {
                            let value = input.get_copy();
                            ui.text(format!("Bits: {}", value));
                            if !value.is_high_z() {
                                ui.text(format!("Raw: {:#x}", input.value()));
                            }
                            if input.supports_high_z() {
                                ui.text("Accepts Z");
                            }
                        });
                    }
                }
            });

        action
    }
}
