mod core;
mod ui;

use crate::core::circuit::CircuitConfig;
use crate::core::model::ObserverRegistration;
use crate::core::{Model, ModelAccess, ModelEvent};
use crate::ui::{AboutDialog, InputAction, InputListWindow, ShortcutAction, ShortcutManager, SingleValueDialog};
use anyhow::{anyhow, Context as _, Result};
use imgui::{Context, FontConfig, FontSource};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::ModifiersState;
use winit::window::WindowBuilder;

use glutin::prelude::*;
use glutin::display::GetGlDisplay;
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasRawWindowHandle;
use glow::HasContext;

use std::time::{Duration, Instant};
use std::sync::Arc;
use std::fs;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long a status bar message stays up
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

struct AppState {
    circuit: CircuitConfig,
    model: Option<Arc<Model>>,
    model_events: Option<ObserverRegistration>,
    dialogs: Vec<SingleValueDialog>,
    input_list: InputListWindow,
    shortcut_manager: ShortcutManager,
    about_dialog: AboutDialog,
    status_message: Option<String>,
    status_since: Instant,
    // Window visibility
    show_inputs: bool,
    show_shortcuts: bool,
}

/// Persistent application settings
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AppSettings {
    #[serde(default = "default_true")]
    show_inputs: bool,
    #[serde(default)]
    show_shortcuts: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            show_inputs: true,
            show_shortcuts: false,
        }
    }
}

impl AppSettings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bitdial").join("settings.json"))
    }

    fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path)
            .context("Failed to read settings")
            .and_then(|contents| serde_json::from_str(&contents).context("Failed to parse settings"))
        {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{:#} ({}), using defaults", e, path.display());
                Self::default()
            }
        }
    }

    fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .context("Failed to create config directory")
            .and_then(|_| serde_json::to_string_pretty(self).context("Failed to serialize settings"))
            .and_then(|json| fs::write(&path, json).context("Failed to write settings"));
        if let Err(e) = result {
            warn!("{:#}", e);
        }
    }
}

impl AppState {
    fn new() -> Self {
        // Load persisted settings
        let settings = AppSettings::load();

        let mut state = Self {
            circuit: CircuitConfig::load_or_default(),
            model: None,
            model_events: None,
            dialogs: Vec::new(),
            input_list: InputListWindow::new(),
            shortcut_manager: ShortcutManager::new(),
            about_dialog: AboutDialog::new(),
            status_message: None,
            status_since: Instant::now(),
            show_inputs: settings.show_inputs,
            show_shortcuts: settings.show_shortcuts,
        };
        state.start_simulation();
        state
    }

    fn save_settings(&self) {
        let settings = AppSettings {
            show_inputs: self.show_inputs,
            show_shortcuts: self.show_shortcuts,
        };
        settings.save();
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
        self.status_since = Instant::now();
    }

    /// Drop the status message once it has been shown long enough
    fn expire_status(&mut self, now: Instant) {
        if self.status_message.is_some() && now.saturating_duration_since(self.status_since) >= STATUS_TIMEOUT {
            self.status_message = None;
        }
    }

    fn is_running(&self) -> bool {
        self.model.as_ref().is_some_and(|m| !m.is_closed())
    }

    fn start_simulation(&mut self) {
        if self.is_running() {
            return;
        }
        let model = Arc::new(Model::from_config(&self.circuit));
        self.model_events = Some(model.add_observer(&[ModelEvent::Started, ModelEvent::Closed]));
        model.start();
        self.model = Some(model);
    }

    fn stop_simulation(&mut self) {
        // Open dialogs see the Closed event on their next poll
        if let Some(model) = self.model.take() {
            model.close();
        }
    }

    /// Drain model notifications and retire closed dialogs
    fn process_model_events(&mut self) {
        let events: Vec<ModelEvent> = self
            .model_events
            .as_ref()
            .map(|registration| registration.events.try_iter().collect())
            .unwrap_or_default();
        for event in events {
            self.set_status(match event {
                ModelEvent::Started => "Simulation running".to_string(),
                ModelEvent::Closed => "Simulation stopped".to_string(),
            });
        }

        let mut errors = Vec::new();
        for dialog in &mut self.dialogs {
            dialog.poll_model_events();
            errors.extend(dialog.take_error());
        }
        for e in errors {
            self.set_status(e);
        }
        self.dialogs.retain(|d| {
            if !d.is_open() {
                debug!("Retiring {}", d.title());
            }
            d.is_open()
        });
    }

    fn open_dialog(&mut self, name: &str, position: [f32; 2]) {
        if let Some(dialog) = self.dialogs.iter_mut().find(|d| d.target().name() == name) {
            dialog.request_focus();
            return;
        }

        let Some(model) = self.model.as_ref() else {
            return;
        };
        let target = match model.input(name) {
            Ok(target) => target,
            Err(e) => {
                warn!("{}", e);
                self.set_status(e.to_string());
                return;
            }
        };
        let format = self
            .circuit
            .inputs
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.format)
            .unwrap_or_default();

        let access: Arc<dyn ModelAccess> = model.clone();
        let supports_high_z = target.supports_high_z();
        match SingleValueDialog::new(name, position, target, supports_high_z, access) {
            Ok(dialog) => self.dialogs.push(dialog.with_format(format)),
            Err(e) => {
                error!("Cannot edit {}: {}", name, e);
                self.set_status(format!("Cannot edit {}: {}", name, e));
            }
        }
    }

    /// Returns true if the application should quit
    fn handle_shortcut(&mut self, action: ShortcutAction) -> bool {
        match action {
            ShortcutAction::StartSimulation => self.start_simulation(),
            ShortcutAction::StopSimulation => self.stop_simulation(),
            ShortcutAction::ToggleInputs => self.show_inputs = !self.show_inputs,
            ShortcutAction::ShowShortcuts => self.show_shortcuts = true,
            ShortcutAction::Quit => return true,
        }
        false
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Create event loop
    let event_loop = EventLoop::new().context("Failed to create EventLoop")?;

    // Build the window and GL display using glutin-winit
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(
            WindowBuilder::new()
                .with_title("bitdial - Logic Input Editor")
                .with_inner_size(winit::dpi::LogicalSize::new(900.0, 600.0))
        ))
        .build(&event_loop, glutin::config::ConfigTemplateBuilder::new(), |mut iter| {
            iter.next().expect("No GL config available")
        })
        .map_err(|e| anyhow!("Failed to create window and display: {}", e))?;

    let window = window.context("Failed to create window")?;
    let gl_display = gl_config.display();

    // Create the context using the proper API
    let context = unsafe {
        gl_display.create_context(
            &gl_config,
            &glutin::context::ContextAttributesBuilder::new()
                .build(Some(window.raw_window_handle())),
        )
    }.context("Failed to create GL context")?;

    // Create surface and make context current
    let attrs = window.build_surface_attributes(
        glutin::surface::SurfaceAttributesBuilder::<glutin::surface::WindowSurface>::new()
    );

    let surface = unsafe {
        gl_display.create_window_surface(&gl_config, &attrs)
    }.context("Failed to create surface")?;

    let context = context.make_current(&surface).context("Failed to make context current")?;

    // Create glow context for renderer
    let gl = unsafe {
        glow::Context::from_loader_function(|ptr| {
            gl_display.get_proc_address(&std::ffi::CString::new(ptr).unwrap()) as *const _
        })
    };

    // Set up imgui
    let mut imgui = Context::create();
    imgui.set_log_filename(None::<std::path::PathBuf>);

    // Window positions are kept next to the settings
    let ini_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("bitdial")
        .join("layout.ini");

    if let Some(parent) = ini_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    imgui.set_ini_filename(Some(ini_path));

    // Enable docking
    imgui.io_mut().config_flags |= imgui::ConfigFlags::DOCKING_ENABLE;

    // Configure fonts
    let hidpi_factor = window.scale_factor();
    let font_size = (14.0 * hidpi_factor) as f32;
    imgui.fonts().add_font(&[FontSource::DefaultFontData {
        config: Some(FontConfig {
            size_pixels: font_size,
            ..FontConfig::default()
        }),
    }]);
    imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;

    // Set up platform and renderer
    let mut platform = WinitPlatform::init(&mut imgui);
    platform.attach_window(imgui.io_mut(), &window, HiDpiMode::Default);

    let mut renderer = imgui_glow_renderer::AutoRenderer::initialize(gl, &mut imgui)
        .map_err(|e| anyhow!("Failed to initialize renderer: {}", e))?;

    // Create a second glow context for clearing (both reference the same GL context)
    let gl_clear = unsafe {
        glow::Context::from_loader_function(|ptr| {
            gl_display.get_proc_address(&std::ffi::CString::new(ptr).unwrap()) as *const _
        })
    };

    // Create app state
    let mut state = AppState::new();
    let mut modifiers = ModifiersState::empty();
    let mut last_frame_time = Instant::now();
    let mut last_settings_save = Instant::now();
    info!("bitdial started with {} inputs", state.circuit.inputs.len());

    // Main loop
    event_loop.run(move |event, window_target| {
        match &event {
            Event::NewEvents(_) => {
                let now = Instant::now();
                imgui.io_mut().update_delta_time(now - last_frame_time);
                last_frame_time = now;
            }
            Event::AboutToWait => {
                state.process_model_events();
                state.expire_status(Instant::now());

                // Save settings periodically (every 30 seconds)
                if last_settings_save.elapsed().as_secs() >= 30 {
                    state.save_settings();
                    last_settings_save = Instant::now();
                }

                if let Err(e) = platform.prepare_frame(imgui.io_mut(), &window) {
                    error!("Failed to prepare frame: {}", e);
                }
                window.request_redraw();
            }
            Event::WindowEvent { event: WindowEvent::ModifiersChanged(new_modifiers), .. } => {
                modifiers = new_modifiers.state();
            }
            Event::WindowEvent { event: WindowEvent::KeyboardInput { event: key_event, .. }, .. } => {
                // Plain keys belong to a focused text field
                let typing = imgui.io().want_text_input && !modifiers.control_key();
                if !typing {
                    let action = state.shortcut_manager.process_event(
                        key_event,
                        modifiers.control_key(),
                        modifiers.shift_key(),
                        modifiers.alt_key(),
                    );
                    if let Some(action) = action {
                        if state.handle_shortcut(action) {
                            state.save_settings();
                            window_target.exit();
                        }
                    }
                }
            }
            Event::WindowEvent { event: WindowEvent::RedrawRequested, .. } => {
                let ui = imgui.new_frame();

                // Menu bar
                let mut quit = false;
                ui.main_menu_bar(|| {
                    ui.menu("File", || {
                        if ui.menu_item_config("Exit").shortcut("Ctrl+Q").build() {
                            quit = true;
                        }
                    });

                    ui.menu("Simulation", || {
                        let running = state.is_running();
                        if ui.menu_item_config("Start").shortcut("F5").enabled(!running).build() {
                            state.start_simulation();
                        }
                        if ui.menu_item_config("Stop").shortcut("Shift+F5").enabled(running).build() {
                            state.stop_simulation();
                        }
                    });

                    ui.menu("View", || {
                        let _tok = if state.show_inputs { Some(ui.push_style_color(imgui::StyleColor::Text, [0.0, 1.0, 0.0, 1.0])) } else { None };
                        if ui.menu_item("Inputs") {
                            state.show_inputs = !state.show_inputs;
                        }
                        drop(_tok);
                    });

                    ui.menu("Help", || {
                        if ui.menu_item("Keyboard Shortcuts") {
                            state.show_shortcuts = true;
                        }
                        ui.separator();
                        if ui.menu_item("About bitdial") {
                            state.about_dialog.show();
                        }
                    });
                });
                if quit {
                    state.save_settings();
                    window_target.exit();
                }

                // Status bar
                let window_size = window.inner_size();
                ui.set_cursor_pos([0.0, window_size.height as f32 / hidpi_factor as f32 - 25.0]);
                ui.child_window("Status")
                    .size([window_size.width as f32 / hidpi_factor as f32, 25.0])
                    .build(|| {
                        if let Some(ref msg) = state.status_message {
                            ui.text(msg);
                        } else if state.is_running() {
                            ui.text(format!(
                                "Inputs: {} | Open editors: {}",
                                state.circuit.inputs.len(),
                                state.dialogs.len()
                            ));
                        } else {
                            ui.text("Simulation stopped (Simulation > Start)");
                        }
                    });

                ui.dockspace_over_main_viewport();

                if state.show_inputs {
                    let model = state.model.as_deref().filter(|m| !m.is_closed());
                    let action = state.input_list.render(ui, model, &state.circuit.inputs, &mut state.show_inputs);
                    if let InputAction::Edit { name, position } = action {
                        state.open_dialog(&name, position);
                    }
                }

                for dialog in &mut state.dialogs {
                    dialog.render(ui);
                }

                // Keyboard Shortcuts help window
                if state.show_shortcuts {
                    state.shortcut_manager.render_help(ui, &mut state.show_shortcuts);
                }

                // About Dialog
                state.about_dialog.render(ui);

                // Prepare and render
                platform.prepare_render(ui, &window);
                let draw_data = imgui.render();

                unsafe {
                    gl_clear.clear_color(0.1, 0.1, 0.1, 1.0);
                    gl_clear.clear(glow::COLOR_BUFFER_BIT);
                }

                if let Err(e) = renderer.render(draw_data) {
                    error!("Rendering failed: {}", e);
                    window_target.exit();
                }
                if let Err(e) = surface.swap_buffers(&context) {
                    error!("Failed to swap buffers: {}", e);
                    window_target.exit();
                }
            }
            Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                state.save_settings();
                window_target.exit();
            }
            _ => {}
        }

        platform.handle_event(imgui.io_mut(), &window, &event);
    }).context("EventLoop error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_for_missing_fields() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
        assert!(settings.show_inputs);
    }

    #[test]
    fn test_stop_closes_open_dialogs() {
        let mut state = AppState {
            circuit: CircuitConfig::demo(),
            model: None,
            model_events: None,
            dialogs: Vec::new(),
            input_list: InputListWindow::new(),
            shortcut_manager: ShortcutManager::new(),
            about_dialog: AboutDialog::new(),
            status_message: None,
            status_since: Instant::now(),
            show_inputs: true,
            show_shortcuts: false,
        };
        state.start_simulation();
        assert!(state.is_running());

        state.open_dialog("DATA", [10.0, 10.0]);
        state.open_dialog("DATA", [20.0, 20.0]);
        state.open_dialog("ADDR", [30.0, 30.0]);
        assert_eq!(state.dialogs.len(), 2);
        assert_eq!(state.dialogs[1].text(), "0x00001000");

        state.open_dialog("NOPE", [0.0, 0.0]);
        assert_eq!(state.dialogs.len(), 2);

        assert!(!state.handle_shortcut(ShortcutAction::StopSimulation));
        state.process_model_events();
        assert!(state.dialogs.is_empty());
        assert!(!state.is_running());
        assert_eq!(state.status_message.as_deref(), Some("Simulation stopped"));

        assert!(state.handle_shortcut(ShortcutAction::Quit));
    }

    #[test]
    fn test_status_message_expires() {
        let mut state = AppState {
            circuit: CircuitConfig::demo(),
            model: None,
            model_events: None,
            dialogs: Vec::new(),
            input_list: InputListWindow::new(),
            shortcut_manager: ShortcutManager::new(),
            about_dialog: AboutDialog::new(),
            status_message: None,
            status_since: Instant::now(),
            show_inputs: true,
            show_shortcuts: false,
        };
        state.start_simulation();
        state.process_model_events();
        assert_eq!(state.status_message.as_deref(), Some("Simulation running"));

        let shown = state.status_since;
        state.expire_status(shown + Duration::from_secs(1));
        assert!(state.status_message.is_some());
        state.expire_status(shown + STATUS_TIMEOUT);
        assert!(state.status_message.is_none());

        // A new message restarts the timer
        state.stop_simulation();
        state.process_model_events();
        assert_eq!(state.status_message.as_deref(), Some("Simulation stopped"));
        state.expire_status(state.status_since + Duration::from_secs(1));
        assert!(state.status_message.is_some());
    }
}
