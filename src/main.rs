// main.rs — 窗口宿主：菜单、导航栏、状态栏与鼠标/触摸交互

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use panorama_sphere::config::{CliArgs, PanoramaSource};
use panorama_sphere::geometry::{normalize_longitude, rad_to_deg};
use panorama_sphere::i18n::{self, tr, tr_with};
use panorama_sphere::loader::BackgroundLoader;
use panorama_sphere::navbar::{NavBar, NavBarAction};
use panorama_sphere::renderer::WgpuRenderer;
use panorama_sphere::{EventKind, Viewer, ViewerEvent};

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

/// Requests collected while drawing the UI, applied once the frame is done.
enum UiAction {
    Open(PathBuf),
    Exit,
    ResetView,
    Nav(NavBarAction),
    Language(String),
}

/// Viewer state shown in the overlay, copied out before drawing.
struct StatusSnapshot {
    theta: f64,
    phi: f64,
    fov: f64,
    loading: bool,
    ready: bool,
}

struct UiState {
    show_status: bool,
    navbar_enabled: bool,
    lang: String,
    loading_msg: String,
    load_error: Rc<RefCell<Option<String>>>,
    navbar: Rc<RefCell<NavBar>>,
}

fn fatal(message: String) -> ! {
    log::error!("{}", message);
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(&tr("app.title"))
        .set_description(&message)
        .show();
    std::process::exit(1);
}

fn pick_panorama() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&tr("file.filter.images"), &["jpg", "jpeg", "png", "webp", "tif", "tiff"])
        .pick_file()
}

fn main() {
    env_logger::init();

    let cli = CliArgs::parse(std::env::args());
    let lang = i18n::resolve_lang(cli.lang.as_deref());
    i18n::init(lang.clone());

    let config = match cli.to_configuration() {
        Ok(c) => c,
        Err(e) => fatal(e.to_string()),
    };

    let event_loop = EventLoop::new();
    let initial_size = config
        .size
        .map_or(LogicalSize::new(1280, 720), |s| LogicalSize::new(s.width, s.height));
    let window = match WindowBuilder::new()
        .with_title(tr("app.title"))
        .with_inner_size(initial_size)
        .build(&event_loop)
    {
        Ok(w) => Arc::new(w),
        Err(e) => fatal(tr_with("error.unsupported", &[("err", e.to_string())])),
    };

    let renderer = match pollster::block_on(WgpuRenderer::new(window.clone())) {
        Ok(r) => r,
        Err(e) => fatal(tr_with("error.unsupported", &[("err", e.to_string())])),
    };
    let size = window.inner_size();
    let mut viewer = Viewer::new(config, renderer, (size.width, size.height));

    let mut ui = UiState {
        show_status: true,
        navbar_enabled: viewer.config().navbar,
        lang,
        loading_msg: viewer.config().loading_msg.clone().unwrap_or_else(|| tr("status.loading")),
        load_error: Rc::new(RefCell::new(None)),
        navbar: Rc::new(RefCell::new(NavBar::new(viewer.config().caption.clone()))),
    };
    subscribe(&mut viewer, &ui, window.clone());

    let mut loads = BackgroundLoader::new();
    if viewer.config().autoload {
        if let Some(source) = viewer.config().panorama.clone() {
            loads.start(source, viewer.config().use_xmp_data);
        }
    }

    let started = Instant::now();
    let mut cursor = PhysicalPosition::new(0.0, 0.0);
    let mut active_touch: Option<u64> = None;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        if let Some(result) = loads.poll() {
            // failures are reported through the LoadFailed event
            let _ = match result {
                Ok(loaded) => viewer.install(loaded),
                Err(e) => viewer.fail_load(e),
            };
        }

        match event {
            Event::WindowEvent { event, .. } => {
                let response = {
                    let r = viewer.renderer_mut();
                    r.egui_state.on_event(&r.egui_ctx, &event)
                };
                // a drag must end even when the button is released over the UI
                if let WindowEvent::MouseInput {
                    state: ElementState::Released,
                    button: MouseButton::Left,
                    ..
                } = event
                {
                    viewer.pointer_up();
                }
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,

                    WindowEvent::Resized(new_size) => viewer.resize(new_size.width, new_size.height),

                    WindowEvent::KeyboardInput { input, .. } if input.state == ElementState::Pressed => {
                        match input.virtual_keycode {
                            Some(VirtualKeyCode::O) => {
                                if let Some(path) = pick_panorama() {
                                    start_load(&viewer, path, &mut loads, &ui);
                                }
                            }
                            Some(VirtualKeyCode::F11) => viewer.toggle_fullscreen(),
                            Some(VirtualKeyCode::Escape) if viewer.is_fullscreen() => viewer.set_fullscreen(false),
                            Some(VirtualKeyCode::Space) => viewer.toggle_autorotate(),
                            Some(VirtualKeyCode::Equals) | Some(VirtualKeyCode::NumpadAdd) => viewer.zoom_in(),
                            Some(VirtualKeyCode::Minus) | Some(VirtualKeyCode::NumpadSubtract) => viewer.zoom_out(),
                            _ => {}
                        }
                    }

                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => viewer.pointer_down(cursor.x, cursor.y),

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = position;
                        viewer.pointer_move(position.x, position.y);
                    }

                    // single-finger drag only
                    WindowEvent::Touch(touch) => match touch.phase {
                        TouchPhase::Started if active_touch.is_none() => {
                            active_touch = Some(touch.id);
                            viewer.pointer_down(touch.location.x, touch.location.y);
                        }
                        TouchPhase::Moved if active_touch == Some(touch.id) => {
                            viewer.pointer_move(touch.location.x, touch.location.y);
                        }
                        TouchPhase::Ended | TouchPhase::Cancelled if active_touch == Some(touch.id) => {
                            active_touch = None;
                            viewer.pointer_up();
                        }
                        _ => {}
                    },

                    WindowEvent::MouseWheel { delta, .. } => match delta {
                        MouseScrollDelta::LineDelta(_, y) => viewer.wheel(y as f64),
                        MouseScrollDelta::PixelDelta(pos) => viewer.wheel(pos.y),
                    },

                    WindowEvent::DroppedFile(path) => {
                        start_load(&viewer, path, &mut loads, &ui);
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                viewer.update(started.elapsed());

                let (theta, phi) = viewer.position();
                let status = StatusSnapshot {
                    theta,
                    phi,
                    fov: viewer.fov(),
                    loading: loads.is_loading(),
                    ready: viewer.is_ready(),
                };

                let mut actions = Vec::new();
                let render_result = viewer
                    .renderer_mut()
                    .render_with_ui(&window, |ctx| draw_ui(ctx, &mut ui, &status, &mut actions));

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => viewer.renderer_mut().reconfigure(),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::warn!("render error: {:?}", e),
                }

                for action in actions {
                    match action {
                        UiAction::Open(path) => {
                            start_load(&viewer, path, &mut loads, &ui);
                        }
                        UiAction::Exit => *control_flow = ControlFlow::Exit,
                        UiAction::ResetView => viewer.reset_view(),
                        UiAction::Nav(NavBarAction::ToggleAutorotate) => viewer.toggle_autorotate(),
                        UiAction::Nav(NavBarAction::ZoomIn) => viewer.zoom_in(),
                        UiAction::Nav(NavBarAction::ZoomOut) => viewer.zoom_out(),
                        UiAction::Nav(NavBarAction::ZoomTo(level)) => viewer.zoom(level as f64),
                        UiAction::Nav(NavBarAction::ToggleFullscreen) => viewer.toggle_fullscreen(),
                        UiAction::Language(code) => {
                            i18n::init(code);
                            window.set_title(&tr("app.title"));
                        }
                    }
                }
            }

            Event::MainEventsCleared => window.request_redraw(),

            _ => {}
        }
    });
}

/// Wires viewer events to the navigation bar, the error overlay and the window.
fn subscribe(viewer: &mut Viewer<WgpuRenderer>, ui: &UiState, window: Arc<Window>) {
    for kind in [EventKind::Autorotate, EventKind::ZoomUpdated, EventKind::FullscreenUpdated] {
        let navbar = ui.navbar.clone();
        viewer.on(kind, move |e| navbar.borrow_mut().apply_event(e));
    }

    viewer.on(EventKind::FullscreenUpdated, move |e| {
        if let ViewerEvent::FullscreenUpdated { fullscreen } = e {
            window.set_fullscreen(fullscreen.then(|| Fullscreen::Borderless(None)));
        }
    });

    let err = ui.load_error.clone();
    viewer.on(EventKind::LoadFailed, move |e| {
        if let ViewerEvent::LoadFailed { reason } = e {
            *err.borrow_mut() = Some(reason.clone());
        }
    });
    let err = ui.load_error.clone();
    viewer.on(EventKind::Ready, move |_| *err.borrow_mut() = None);

    viewer.on(EventKind::SizeUpdated, |e| log::debug!("{:?}", e));
}

fn start_load(viewer: &Viewer<WgpuRenderer>, path: PathBuf, loads: &mut BackgroundLoader, ui: &UiState) {
    *ui.load_error.borrow_mut() = None;
    loads.start(PanoramaSource::Path(path), viewer.config().use_xmp_data);
}

fn draw_ui(ctx: &egui::Context, ui_state: &mut UiState, status: &StatusSnapshot, actions: &mut Vec<UiAction>) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(tr("menu.file"), |ui| {
                if ui.button(tr("menu.open_image")).clicked() {
                    ui.close_menu();
                    if let Some(path) = pick_panorama() {
                        actions.push(UiAction::Open(path));
                    }
                }
                if ui.button(tr("menu.exit")).clicked() {
                    actions.push(UiAction::Exit);
                }
            });

            ui.menu_button(tr("menu.view"), |ui| {
                if ui.button(tr("view.reset")).clicked() {
                    actions.push(UiAction::ResetView);
                    ui.close_menu();
                }
                ui.checkbox(&mut ui_state.show_status, tr("view.show_status"));
            });

            ui.menu_button(tr("menu.language"), |ui| {
                for (code, name) in i18n::LANGUAGES {
                    if ui.radio_value(&mut ui_state.lang, code.to_string(), name).clicked() {
                        actions.push(UiAction::Language(code.to_string()));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    if ui_state.navbar_enabled {
        let nav = ui_state.navbar.borrow_mut().show(ctx);
        actions.extend(nav.into_iter().map(UiAction::Nav));
    }

    if ui_state.show_status && status.ready {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!(
                    "{}: {:.1}°",
                    tr("status.longitude"),
                    rad_to_deg(normalize_longitude(status.theta))
                ));
                ui.label("|");
                ui.label(format!("{}: {:.1}°", tr("status.latitude"), rad_to_deg(status.phi)));
                ui.label("|");
                ui.label(format!("FOV: {:.1}°", status.fov));
            });
        });
    }

    let message = if status.loading {
        Some((ui_state.loading_msg.clone(), egui::Color32::YELLOW))
    } else {
        ui_state
            .load_error
            .borrow()
            .as_ref()
            .map(|e| (tr_with("error.load_failed", &[("err", e.clone())]), egui::Color32::LIGHT_RED))
    };
    if let Some((text, color)) = message {
        egui::Area::new("overlay")
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(text).color(color).size(18.0));
            });
    }
}
