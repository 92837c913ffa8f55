use crate::core::bits;
use crate::core::model::ObserverRegistration;
use crate::core::{IntFormat, ModelAccess, ModelError, ModelEvent, ObservableValue, Value};
use imgui::{Condition, Direction, Key, Ui};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, trace, warn};

/// A format offered in the format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatEntry {
    pub format: IntFormat,
    pub name: &'static str,
}

static FORMATS: OnceLock<Vec<FormatEntry>> = OnceLock::new();

/// Formats selectable in the dialog: every known format except fixed point
pub fn format_catalog() -> &'static [FormatEntry] {
    FORMATS.get_or_init(|| {
        IntFormat::ALL
            .iter()
            .filter(|f| !f.is_fixed_point())
            .map(|&format| FormatEntry {
                format,
                name: format.display_name(),
            })
            .collect()
    })
}

fn find_format(format: IntFormat) -> Option<usize> {
    format_catalog().iter().position(|e| e.format == format)
}

/// Keyboard binding of the dialog window
fn key_action(key: Key, shift: bool) -> Option<DialogAction> {
    match key {
        Key::Escape => Some(DialogAction::Cancel),
        Key::Enter | Key::KeypadEnter if shift => Some(DialogAction::Apply),
        Key::Enter | Key::KeypadEnter => Some(DialogAction::Accept),
        Key::UpArrow => Some(DialogAction::StepUp),
        Key::DownArrow => Some(DialogAction::StepDown),
        _ => None,
    }
}

const DIALOG_KEYS: [Key; 5] = [
    Key::Escape,
    Key::Enter,
    Key::KeypadEnter,
    Key::UpArrow,
    Key::DownArrow,
];

/// User input collected while drawing a frame, handled once the window is built
#[derive(Debug, Clone, PartialEq)]
enum DialogAction {
    SelectFormat(IntFormat),
    TextEdited(String),
    ToggleBit(u8),
    StepUp,
    StepDown,
    Accept,
    Apply,
    Cancel,
}

/// Dialog to edit a single multi-bit input value.
///
/// The text field, the checkbox row and the working value are kept in sync.
/// Text and checkbox edits stay local until OK or Apply; spinner steps are
/// written to the target immediately.
pub struct SingleValueDialog {
    title: String,
    position: [f32; 2],
    target: Arc<ObservableValue>,
    model: Arc<dyn ModelAccess>,
    registration: Option<ObserverRegistration>,
    supports_high_z: bool,
    mask: u64,
    edit_value: Value,
    format: IntFormat,
    text: String,
    /// Set while the text field is the origin of an update
    text_is_modifying: bool,
    check_boxes: Vec<bool>,
    focus_requested: bool,
    open: bool,
    last_error: Option<String>,
}

impl SingleValueDialog {
    /// Open an editor for `target`, registering for the model's close notification
    pub fn new(
        label: &str,
        position: [f32; 2],
        target: Arc<ObservableValue>,
        supports_high_z: bool,
        model: Arc<dyn ModelAccess>,
    ) -> Result<Self, ModelError> {
        let mut registration = None;
        model.modify(&mut || registration = Some(model.add_observer(&[ModelEvent::Closed])))?;

        let edit_value = target.get_copy();
        let bits = target.bits();
        let mut dialog = Self {
            title: format!("Input {}", label),
            position,
            target,
            model,
            registration,
            supports_high_z,
            mask: bits::mask(bits),
            edit_value,
            format: IntFormat::Def,
            text: String::new(),
            text_is_modifying: false,
            check_boxes: vec![false; bits as usize],
            focus_requested: true,
            open: true,
            last_error: None,
        };
        dialog.sync_check_boxes();
        dialog.set_long_to_dialog();
        info!("Opened value dialog for {} ({} bits)", label, bits);
        Ok(dialog)
    }

    /// Select the format used for the text field
    pub fn with_format(mut self, format: IntFormat) -> Self {
        self.select_format(format);
        self.request_focus();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn target(&self) -> &Arc<ObservableValue> {
        &self.target
    }

    pub fn edit_value(&self) -> Value {
        self.edit_value
    }

    pub fn format(&self) -> IntFormat {
        self.format
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Checkbox states, indexed by bit number
    pub fn check_boxes(&self) -> &[bool] {
        &self.check_boxes
    }

    /// Label of the format selector; empty for formats it does not offer
    pub fn combo_preview(&self) -> &'static str {
        find_format(self.format())
            .map(|i| format_catalog()[i].name)
            .unwrap_or("")
    }

    /// Checkboxes are greyed out while the value is floating
    pub fn bits_enabled(&self) -> bool {
        !self.edit_value.is_high_z()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Give the text field keyboard focus with its content selected
    pub fn request_focus(&mut self) {
        self.focus_requested = true;
    }

    /// Last error raised while writing to the model, if any
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    pub fn select_format(&mut self, format: IntFormat) {
        self.format = format;
        self.set_long_to_dialog();
    }

    pub fn set_bit(&mut self, bit: u8, set: bool) {
        if bit >= self.edit_value.bits() {
            return;
        }
        self.edit_value = self.edit_value.with_bit(bit, set);
        self.sync_check_boxes();
        self.set_long_to_dialog();
    }

    pub fn toggle_bit(&mut self, bit: u8) {
        let set = !self.edit_value.bit(bit);
        self.set_bit(bit, set);
    }

    /// The text field changed
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.text_is_modifying = true;
        self.set_string_to_dialog();
        self.text_is_modifying = false;
    }

    fn set_string_to_dialog(&mut self) {
        let bits = self.edit_value.bits();
        let text = self.text.trim();
        if self.supports_high_z && text.eq_ignore_ascii_case("z") {
            self.edit_value = Value::high_z(bits);
        } else {
            match bits::decode(text) {
                Ok(v) => self.edit_value = Value::new(v, bits),
                Err(e) => trace!("Keeping previous value: {}", e),
            }
        }
        self.sync_check_boxes();
        self.set_long_to_dialog();
    }

    fn set_long_to_dialog(&mut self) {
        if !self.text_is_modifying {
            self.text = self.format.format_to_edit(&self.edit_value);
            self.focus_requested = true;
        }
    }

    fn sync_check_boxes(&mut self) {
        let value = self.edit_value;
        for (bit, checked) in self.check_boxes.iter_mut().enumerate() {
            *checked = value.bit(bit as u8);
        }
    }

    /// Value shown after one spinner step up
    pub fn next_value(&self) -> u64 {
        self.edit_value.value().wrapping_add(1) & self.mask
    }

    /// Value shown after one spinner step down
    pub fn previous_value(&self) -> u64 {
        self.edit_value.value().wrapping_sub(1) & self.mask
    }

    /// Take a spinner value as the working value and write it to the target
    pub fn commit_spinner_value(&mut self, value: u64) -> Result<(), ModelError> {
        self.edit_value = Value::new(value, self.edit_value.bits());
        self.sync_check_boxes();
        self.set_long_to_dialog();
        self.apply()
    }

    pub fn step_up(&mut self) -> Result<(), ModelError> {
        let next = self.next_value();
        self.commit_spinner_value(next)
    }

    pub fn step_down(&mut self) -> Result<(), ModelError> {
        let previous = self.previous_value();
        self.commit_spinner_value(previous)
    }

    /// Write the working value into the target cell
    pub fn apply(&self) -> Result<(), ModelError> {
        let value = self.edit_value;
        let target = &self.target;
        self.model.modify(&mut || value.apply_to(target))?;
        debug!("Applied {} to {}", value, target.name());
        Ok(())
    }

    /// Apply, then close
    pub fn ok(&mut self) -> Result<(), ModelError> {
        let result = self.apply();
        self.close();
        result
    }

    /// Close without applying pending edits
    pub fn cancel(&mut self) {
        self.close();
    }

    /// Drain model notifications; a closed model closes the dialog
    pub fn poll_model_events(&mut self) {
        let closed = match &self.registration {
            Some(registration) => registration
                .events
                .try_iter()
                .any(|event| event == ModelEvent::Closed),
            None => false,
        };
        if closed {
            info!("Model closed, closing {}", self.title);
            self.close();
        }
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Some(registration) = self.registration.take() {
            let id = registration.id;
            let model = &self.model;
            if let Err(e) = model.modify(&mut || model.remove_observer(id)) {
                warn!("Removing observer {} outside of a transaction: {}", id, e);
                model.remove_observer(id);
            }
        }
        debug!("Closed {}", self.title);
    }

    fn handle(&mut self, action: DialogAction) {
        let result = match action {
            DialogAction::SelectFormat(format) => {
                self.select_format(format);
                Ok(())
            }
            DialogAction::TextEdited(text) => {
                self.set_text(&text);
                Ok(())
            }
            DialogAction::ToggleBit(bit) => {
                self.toggle_bit(bit);
                Ok(())
            }
            DialogAction::StepUp => self.step_up(),
            DialogAction::StepDown => self.step_down(),
            DialogAction::Accept => self.ok(),
            DialogAction::Apply => {
                // Enter deactivates the text field, hand the caret back
                self.request_focus();
                self.apply()
            }
            DialogAction::Cancel => {
                self.cancel();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("Failed to write {}: {}", self.target.name(), e);
            self.last_error = Some(format!("Failed to write {}: {}", self.target.name(), e));
        }
    }

    pub fn render(&mut self, ui: &Ui) {
        if !self.open {
            return;
        }

        let mut actions = Vec::new();
        let mut window_open = true;
        let window_name = format!("{}##value_dialog_{}", self.title(), self.target.name());

        ui.window(&window_name)
            .position(self.position, Condition::Appearing)
            .always_auto_resize(true)
            .collapsible(false)
            .focused(self.focus_requested)
            .opened(&mut window_open)
            .build(|| {
                self.render_content(ui, &mut actions);
            });

        self.focus_requested = false;
        if !window_open {
            actions.push(DialogAction::Cancel);
        }
        for action in actions {
            self.handle(action);
        }
    }

    fn render_content(&self, ui: &Ui, actions: &mut Vec<DialogAction>) {
        ui.group(|| {
            self.render_value_row(ui, actions);
            self.render_bit_row(ui, actions);
        });

        ui.same_line();

        ui.group(|| {
            if ui.button_with_size("OK", [70.0, 0.0]) {
                actions.push(DialogAction::Accept);
            }
            if ui.button_with_size("Apply", [70.0, 0.0]) {
                actions.push(DialogAction::Apply);
            }
            if ui.is_item_hovered() {
                ui.tooltip_text("Shift+Enter");
            }
        });

        if ui.is_window_focused() {
            let shift = ui.io().key_shift;
            if let Some(action) = DIALOG_KEYS
                .iter()
                .filter(|&&key| ui.is_key_pressed(key))
                .find_map(|&key| key_action(key, shift))
            {
                actions.push(action);
            }
        }
    }

    fn render_value_row(&self, ui: &Ui, actions: &mut Vec<DialogAction>) {
        ui.set_next_item_width(130.0);
        if let Some(_combo) = ui.begin_combo("##format", self.combo_preview()) {
            for entry in format_catalog() {
                let selected = entry.format == self.format();
                if ui
                    .selectable_config(format!("{}##{}", entry.name, entry.format.name()))
                    .selected(selected)
                    .build()
                {
                    actions.push(DialogAction::SelectFormat(entry.format));
                }
                if selected {
                    ui.set_item_default_focus();
                }
            }
        }

        ui.same_line();
        if self.focus_requested {
            ui.set_keyboard_focus_here();
        }
        let mut text = self.text().to_string();
        ui.set_next_item_width(200.0);
        if ui.input_text("##value", &mut text).auto_select_all(true).build() {
            actions.push(DialogAction::TextEdited(text));
        }

        // Spinner
        ui.same_line_with_spacing(0.0, 2.0);
        if ui.arrow_button("##step_up", Direction::Up) {
            actions.push(DialogAction::StepUp);
        }
        ui.same_line_with_spacing(0.0, 2.0);
        if ui.arrow_button("##step_down", Direction::Down) {
            actions.push(DialogAction::StepDown);
        }
    }

    fn render_bit_row(&self, ui: &Ui, actions: &mut Vec<DialogAction>) {
        ui.text(IntFormat::Bin.display_name());
        ui.same_line();

        let _disabled = ui.begin_disabled(!self.bits_enabled());
        ui.group(|| {
            let check_boxes = self.check_boxes();
            for bit in (0..self.edit_value().bits()).rev() {
                let mut checked = check_boxes[bit as usize];
                if ui.checkbox(format!("##bit{}", bit), &mut checked) {
                    actions.push(DialogAction::ToggleBit(bit));
                }
                if ui.is_item_hovered() {
                    ui.tooltip_text(format!("Bit {}", bit));
                }

                // 16 bits per line, nibbles spaced apart
                if bit % 16 != 0 {
                    let spacing = if bit % 4 == 0 { 8.0 } else { 1.0 };
                    ui.same_line_with_spacing(0.0, spacing);
                }
            }
        });
    }
}

impl Drop for SingleValueDialog {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Model, ObserverId};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn setup(bits: u8, value: u64, high_z: bool) -> (Arc<Model>, Arc<ObservableValue>) {
        let target = Arc::new(ObservableValue::new("IN", bits, high_z).with_value(value));
        let model = Arc::new(Model::new(vec![target.clone()]));
        (model, target)
    }

    fn open(model: &Arc<Model>, target: &Arc<ObservableValue>) -> SingleValueDialog {
        let access: Arc<dyn ModelAccess> = model.clone();
        SingleValueDialog::new("IN", [0.0, 0.0], target.clone(), target.supports_high_z(), access)
            .unwrap()
    }

    #[test]
    fn test_format_catalog_excludes_fixed_point() {
        let catalog = format_catalog();
        assert_eq!(catalog.len(), 8);
        assert!(catalog.iter().all(|e| !e.format.is_fixed_point()));
        assert_eq!(catalog[0].format, IntFormat::Def);
        assert_eq!(catalog[3].name, "Hexadecimal");
    }

    #[test]
    fn test_initial_state_mirrors_target() {
        let (model, target) = setup(8, 0xA5, false);
        let dialog = open(&model, &target);
        assert_eq!(dialog.edit_value(), Value::new(0xA5, 8));
        assert_eq!(dialog.text(), "0xA5");
        assert_eq!(dialog.title(), "Input IN");
        assert_eq!(
            dialog.check_boxes(),
            &[true, false, true, false, false, true, false, true]
        );
        assert!(dialog.is_open());
        assert_eq!(model.observer_count(), 1);
    }

    #[test]
    fn test_toggle_bit_flips_one_bit() {
        for width in 1..=6u8 {
            for v in 0..=bits::mask(width) {
                for i in 0..width {
                    let (model, target) = setup(width, v, false);
                    let mut dialog = open(&model, &target).with_format(IntFormat::Dec);
                    dialog.toggle_bit(i);
                    let expected = Value::new(v ^ (1 << i), width);
                    assert_eq!(dialog.edit_value(), expected);
                    assert_eq!(dialog.text(), IntFormat::Dec.format_to_edit(&expected));
                    assert_eq!(dialog.check_boxes()[i as usize], expected.bit(i));
                    // Checkbox edits are not committed
                    assert_eq!(target.value(), v);
                }
            }
        }
    }

    #[test]
    fn test_spinner_wraps_and_commits() {
        for width in 1..=5u8 {
            let modulus = 1u64 << width;
            for v in 0..modulus {
                let (model, target) = setup(width, v, false);
                let mut dialog = open(&model, &target);
                assert_eq!(dialog.next_value(), (v + 1) % modulus);
                dialog.step_up().unwrap();
                assert_eq!(dialog.edit_value().value(), (v + 1) % modulus);
                assert_eq!(target.value(), (v + 1) % modulus);

                dialog.step_down().unwrap();
                dialog.step_down().unwrap();
                assert_eq!(target.value(), (v + modulus - 1) % modulus);
            }
        }
    }

    #[test]
    fn test_spinner_wraps_at_64_bits() {
        let (model, target) = setup(64, u64::MAX, false);
        let mut dialog = open(&model, &target);
        dialog.step_up().unwrap();
        assert_eq!(target.value(), 0);
        dialog.step_down().unwrap();
        assert_eq!(target.value(), u64::MAX);
    }

    #[test]
    fn test_next_value_does_not_commit() {
        let (model, target) = setup(8, 10, false);
        let dialog = open(&model, &target);
        assert_eq!(dialog.next_value(), 11);
        assert_eq!(dialog.previous_value(), 9);
        assert_eq!(target.value(), 10);
        assert_eq!(dialog.edit_value().value(), 10);
    }

    #[test]
    fn test_text_edit_updates_check_boxes_but_keeps_text() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.set_text(" 0x1f ");
        assert_eq!(dialog.edit_value(), Value::new(0x1F, 8));
        // The text being typed is never rewritten into the canonical form
        assert_eq!(dialog.text(), " 0x1f ");
        assert_eq!(
            dialog.check_boxes(),
            &[true, true, true, true, true, false, false, false]
        );
    }

    #[test]
    fn test_text_radix_comes_from_syntax() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target).with_format(IntFormat::Hex);
        dialog.set_text("10");
        assert_eq!(dialog.edit_value().value(), 10);
        dialog.set_text("0b11");
        assert_eq!(dialog.edit_value().value(), 3);
        dialog.set_text("-1");
        assert_eq!(dialog.edit_value().value(), 0xFF);
    }

    #[test]
    fn test_unparsable_text_keeps_previous_value() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("0x2");
        dialog.set_text("0x2g");
        assert_eq!(dialog.edit_value(), Value::new(2, 8));
        assert_eq!(dialog.text(), "0x2g");
        dialog.set_text("");
        assert_eq!(dialog.edit_value(), Value::new(2, 8));
        assert_eq!(
            dialog.check_boxes(),
            &[false, true, false, false, false, false, false, false]
        );
    }

    #[test]
    fn test_format_text_round_trips_through_parser() {
        for width in [1u8, 3, 8, 32] {
            for v in [0u64, 1, 5, 0x41, 0x3F80_0000] {
                let (model, target) = setup(width, v, false);
                let mut dialog = open(&model, &target);
                let before = dialog.edit_value();
                for entry in format_catalog() {
                    dialog.select_format(entry.format);
                    let rendered = dialog.text().to_string();
                    dialog.set_text(&rendered);
                    assert_eq!(dialog.edit_value(), before, "{:?}: {}", entry.format, rendered);
                    if entry.format == IntFormat::Float && width == 32 {
                        assert!(bits::decode(&rendered).is_err(), "{}", rendered);
                    }
                }
            }
        }
    }

    #[test]
    fn test_select_format_rerenders_same_value() {
        let (model, target) = setup(8, 42, false);
        let mut dialog = open(&model, &target);
        dialog.select_format(IntFormat::Bin);
        assert_eq!(dialog.text(), "0b00101010");
        dialog.select_format(IntFormat::Dec);
        assert_eq!(dialog.text(), "42");
        assert_eq!(dialog.edit_value(), Value::new(42, 8));
    }

    #[test]
    fn test_high_z_when_supported() {
        for symbol in ["z", "Z", " z "] {
            let (model, target) = setup(4, 0xF, true);
            let mut dialog = open(&model, &target);
            dialog.set_text(symbol);
            assert!(dialog.edit_value().is_high_z());
            assert!(!dialog.bits_enabled());
            assert!(dialog.check_boxes().iter().all(|c| !c));

            dialog.apply().unwrap();
            assert!(target.get_copy().is_high_z());
        }
    }

    #[test]
    fn test_high_z_rejected_when_unsupported() {
        let (model, target) = setup(4, 0x9, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("z");
        assert_eq!(dialog.edit_value(), Value::new(0x9, 4));
        assert!(dialog.bits_enabled());
    }

    #[test]
    fn test_leaving_high_z() {
        let (model, target) = setup(4, 0, true);
        let mut dialog = open(&model, &target);
        dialog.set_text("Z");
        dialog.select_format(IntFormat::Hex);
        assert_eq!(dialog.text(), "Z");
        dialog.set_text("3");
        assert_eq!(dialog.edit_value(), Value::new(3, 4));
        assert!(dialog.bits_enabled());
    }

    #[test]
    fn test_apply_twice_writes_same_pattern() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("0x3C");
        dialog.apply().unwrap();
        assert_eq!(target.value(), 0x3C);

        // Someone else changes the input between the two applies
        target.set_value(0x01);
        dialog.apply().unwrap();
        assert_eq!(target.value(), 0x3C);
        assert!(dialog.is_open());
    }

    #[test]
    fn test_cancel_discards_typed_value() {
        let (model, target) = setup(8, 0x12, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("0xFF");
        dialog.toggle_bit(0);
        dialog.cancel();
        assert!(!dialog.is_open());
        assert_eq!(target.value(), 0x12);
        assert_eq!(model.observer_count(), 0);
    }

    #[test]
    fn test_ok_applies_and_closes() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("77");
        dialog.ok().unwrap();
        assert_eq!(target.value(), 77);
        assert!(!dialog.is_open());
        assert_eq!(model.observer_count(), 0);
    }

    #[test]
    fn test_actions_dispatch() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.handle(DialogAction::TextEdited("5".to_string()));
        dialog.handle(DialogAction::ToggleBit(7));
        dialog.handle(DialogAction::Apply);
        assert_eq!(target.value(), 0x85);
        dialog.handle(DialogAction::StepUp);
        assert_eq!(target.value(), 0x86);
        dialog.handle(DialogAction::Cancel);
        assert!(!dialog.is_open());
        assert!(dialog.take_error().is_none());
    }

    #[test]
    fn test_apply_returns_focus_to_text() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.set_text("9");
        dialog.focus_requested = false;
        dialog.handle(DialogAction::Apply);
        assert!(dialog.focus_requested);
        assert!(dialog.is_open());
        assert_eq!(target.value(), 9);
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(key_action(Key::Escape, false), Some(DialogAction::Cancel));
        assert_eq!(key_action(Key::Enter, false), Some(DialogAction::Accept));
        assert_eq!(key_action(Key::KeypadEnter, false), Some(DialogAction::Accept));
        assert_eq!(key_action(Key::Enter, true), Some(DialogAction::Apply));
        assert_eq!(key_action(Key::UpArrow, false), Some(DialogAction::StepUp));
        assert_eq!(key_action(Key::DownArrow, true), Some(DialogAction::StepDown));
        assert_eq!(key_action(Key::Tab, false), None);
        assert!(DIALOG_KEYS.iter().all(|&k| key_action(k, false).is_some()));
    }

    #[test]
    fn test_arrow_keys_step_and_commit() {
        let (model, target) = setup(4, 15, false);
        let mut dialog = open(&model, &target);
        if let Some(action) = key_action(Key::UpArrow, false) {
            dialog.handle(action);
        }
        assert_eq!(target.value(), 0);
        if let Some(action) = key_action(Key::DownArrow, false) {
            dialog.handle(action);
        }
        assert_eq!(target.value(), 15);
        assert_eq!(dialog.text(), "0xF");
    }

    #[test]
    fn test_combo_preview_empty_for_fixed_point() {
        let (model, target) = setup(8, 0x18, false);
        let dialog = open(&model, &target).with_format(IntFormat::Hex);
        assert_eq!(dialog.combo_preview(), "Hexadecimal");
        let dialog = dialog.with_format(IntFormat::Fixed(4));
        assert_eq!(dialog.combo_preview(), "");
        assert_eq!(dialog.text(), "1.5");
    }

    #[test]
    fn test_model_close_closes_dialog() {
        let (model, target) = setup(8, 0, false);
        let mut dialog = open(&model, &target);
        dialog.poll_model_events();
        assert!(dialog.is_open());

        model.close();
        dialog.poll_model_events();
        assert!(!dialog.is_open());
        assert_eq!(model.observer_count(), 0);
    }

    #[test]
    fn test_drop_deregisters_observer() {
        let (model, target) = setup(8, 0, false);
        {
            let _dialog = open(&model, &target);
            assert_eq!(model.observer_count(), 1);
        }
        assert_eq!(model.observer_count(), 0);
    }

    #[test]
    fn test_with_format_requests_focus() {
        let (model, target) = setup(8, 65, false);
        let mut dialog = open(&model, &target);
        dialog.focus_requested = false;
        let dialog = dialog.with_format(IntFormat::Ascii);
        assert_eq!(dialog.format(), IntFormat::Ascii);
        assert_eq!(dialog.text(), "'A'");
        assert!(dialog.focus_requested);
    }

    /// Records whether observer changes happen inside a transaction
    #[derive(Default)]
    struct RecordingModel {
        in_transaction: AtomicBool,
        log: Mutex<Vec<String>>,
    }

    impl ModelAccess for RecordingModel {
        fn modify(&self, transaction: &mut dyn FnMut()) -> Result<(), ModelError> {
            self.in_transaction.store(true, Ordering::SeqCst);
            transaction();
            self.in_transaction.store(false, Ordering::SeqCst);
            self.log.lock().unwrap().push("modify".to_string());
            Ok(())
        }

        fn add_observer(&self, events: &[ModelEvent]) -> ObserverRegistration {
            let inside = self.in_transaction.load(Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("add {:?} inside={}", events, inside));
            let (_sender, events) = std::sync::mpsc::channel();
            ObserverRegistration { id: 7, events }
        }

        fn remove_observer(&self, id: ObserverId) {
            let inside = self.in_transaction.load(Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("remove {} inside={}", id, inside));
        }
    }

    #[test]
    fn test_observer_changes_wrapped_in_transactions() {
        let recording = Arc::new(RecordingModel::default());
        let access: Arc<dyn ModelAccess> = recording.clone();
        let target = Arc::new(ObservableValue::new("IN", 4, false));
        let mut dialog = SingleValueDialog::new("IN", [0.0, 0.0], target, false, access).unwrap();
        dialog.set_text("3");
        dialog.ok().unwrap();

        let log = recording.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "add [Closed] inside=true".to_string(),
                "modify".to_string(),
                "modify".to_string(),
                "remove 7 inside=true".to_string(),
                "modify".to_string(),
            ]
        );
    }
}
