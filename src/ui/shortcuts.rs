use imgui::{Ui, Condition};
use winit::event::{KeyEvent, ElementState};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard shortcut manager
pub struct ShortcutManager {
    shortcuts: Vec<Shortcut>,
}

#[derive(Clone)]
pub struct Shortcut {
    pub key: PhysicalKey,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub action: ShortcutAction,
    pub description: String,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ShortcutAction {
    StartSimulation,
    StopSimulation,
    ToggleInputs,
    ShowShortcuts,
    Quit,
}

impl ShortcutManager {
    pub fn new() -> Self {
        let mut manager = Self {
            shortcuts: Vec::new(),
        };
        manager.register_defaults();
        manager
    }

    fn register_defaults(&mut self) {
        // Simulation
        self.register(Shortcut {
            key: PhysicalKey::Code(KeyCode::F5),
            ctrl: false,
            shift: false,
            alt: false,
            action: ShortcutAction::StartSimulation,
            description: "Start Simulation".to_string(),
        });
        self.register(Shortcut {
            key: PhysicalKey::Code(KeyCode::F5),
            ctrl: false,
            shift: true,
            alt: false,
            action: ShortcutAction::StopSimulation,
            description: "Stop Simulation".to_string(),
        });

        // View toggles
        self.register(Shortcut {
            key: PhysicalKey::Code(KeyCode::KeyI),
            ctrl: true,
            shift: false,
            alt: false,
            action: ShortcutAction::ToggleInputs,
            description: "Toggle Inputs Window".to_string(),
        });
        self.register(Shortcut {
            key: PhysicalKey::Code(KeyCode::F1),
            ctrl: false,
            shift: false,
            alt: false,
            action: ShortcutAction::ShowShortcuts,
            description: "Keyboard Shortcuts".to_string(),
        });

        // Other
        self.register(Shortcut {
            key: PhysicalKey::Code(KeyCode::KeyQ),
            ctrl: true,
            shift: false,
            alt: false,
            action: ShortcutAction::Quit,
            description: "Quit".to_string(),
        });
    }

    fn register(&mut self, shortcut: Shortcut) {
        self.shortcuts.push(shortcut);
    }

    /// Process a key event and return the matching action (if any)
    pub fn process_event(&self, event: &KeyEvent, ctrl: bool, shift: bool, alt: bool) -> Option<ShortcutAction> {
        if event.state != ElementState::Pressed || event.repeat {
            return None;
        }
        self.lookup(event.physical_key, ctrl, shift, alt)
    }

    /// Find the action bound to a key and modifier combination
    pub fn lookup(&self, key: PhysicalKey, ctrl: bool, shift: bool, alt: bool) -> Option<ShortcutAction> {
        self.shortcuts
            .iter()
            .find(|s| s.key == key && s.ctrl == ctrl && s.shift == shift && s.alt == alt)
            .map(|s| s.action)
    }

    /// Render a shortcuts help window
    pub fn render_help(&self, ui: &Ui, is_open: &mut bool) {
        ui.window("Keyboard Shortcuts")
            .size([350.0, 260.0], Condition::FirstUseEver)
            .position([500.0, 200.0], Condition::FirstUseEver)
            .opened(is_open)
            .build(|| {
                let mut current_category = String::new();

                for shortcut in &self.shortcuts {
                    let category = match shortcut.action {
                        ShortcutAction::StartSimulation |
                        ShortcutAction::StopSimulation => "Simulation",
                        ShortcutAction::ToggleInputs |
                        ShortcutAction::ShowShortcuts => "View",
                        ShortcutAction::Quit => "General",
                    };

                    if category != current_category {
                        if !current_category.is_empty() {
                            ui.separator();
                        }
                        ui.text(category);
                        current_category = category.to_string();
                    }

                    ui.text(format!("  {:15} - {}", shortcut_label(shortcut), shortcut.description));
                }

                ui.separator();
                ui.text("Value dialog");
                ui.text(format!("  {:15} - {}", "Enter", "OK"));
                ui.text(format!("  {:15} - {}", "Shift+Enter", "Apply"));
                ui.text(format!("  {:15} - {}", "Esc", "Close without applying"));
            });
    }
}

/// Human readable key combination, e.g. `Ctrl+Q`
pub fn shortcut_label(shortcut: &Shortcut) -> String {
    let mut label = String::new();
    if shortcut.ctrl {
        label.push_str("Ctrl+");
    }
    if shortcut.shift {
        label.push_str("Shift+");
    }
    if shortcut.alt {
        label.push_str("Alt+");
    }
    label.push_str(&key_to_string(shortcut.key));
    label
}

fn key_to_string(key: PhysicalKey) -> String {
    match key {
        PhysicalKey::Code(code) => match code {
            KeyCode::Escape => "Esc".to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::F1 => "F1".to_string(),
            KeyCode::F5 => "F5".to_string(),
            KeyCode::KeyI => "I".to_string(),
            KeyCode::KeyQ => "Q".to_string(),
            _ => format!("{:?}", code),
        },
        _ => "?".to_string(),
    }
}

impl Default for ShortcutManager {
    fn default() -> Self {
        Self::new()
    }
}

/// About dialog
pub struct AboutDialog {
    show: bool,
}

impl AboutDialog {
    pub fn new() -> Self {
        Self { show: false }
    }

    pub fn show(&mut self) {
        self.show = true;
    }

    pub fn render(&mut self, ui: &Ui) {
        if !self.show {
            return;
        }

        ui.window("About bitdial")
            .size([380.0, 240.0], Condition::FirstUseEver)
            .build(|| {
                ui.text("bitdial");
                ui.text_colored([0.7, 0.7, 0.7, 1.0], format!("Version {}", env!("CARGO_PKG_VERSION")));
                ui.separator();
                ui.text("Editor for the multi-bit inputs of a");
                ui.text("running logic simulation.");
                ui.separator();
                ui.text("Features:");
                ui.bullet_text("Per-bit checkboxes, spinner and text entry");
                ui.bullet_text("Decimal, hex, binary, octal, ASCII and float views");
                ui.bullet_text("High impedance (Z) inputs");
                ui.separator();
                ui.text("Built with Rust, ImGui, and Glow");
                ui.separator();
                if ui.button("Close") {
                    self.show = false;
                }
            });
    }
}

impl Default for AboutDialog {
    fn default() -> Self {
        Self::new()
    }
}
