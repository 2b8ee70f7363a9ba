// viewer.rs — 查看器生命周期：加载、相机控制、输入与自动旋转

use crate::autorotate::{parse_speed, step, AutorotateStep, Autorotation};
use crate::buffer::{compose, working_width};
use crate::config::ViewerConfiguration;
use crate::error::{Result, ViewerError};
use crate::events::{EventBus, EventKind, ViewerEvent};
use crate::loader::{load_panorama, LoadedPanorama};
use crate::panorama::Orientation;
use crate::renderer::{Renderer, SceneHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DragState {
    active: bool,
    last_x: f64,
    last_y: f64,
}

/// One panorama viewer. Owns the orientation, the autorotation timers and
/// the renderer; all mutation goes through its methods.
pub struct Viewer<R: Renderer> {
    config: ViewerConfiguration,
    renderer: R,
    scene: Option<SceneHandle>,
    orientation: Orientation,
    autorotate: Autorotation,
    events: EventBus,
    drag: DragState,
    size: (u32, u32),
    fullscreen: bool,
    now: Duration,
}

impl<R: Renderer> Viewer<R> {
    /// `viewport` is used unless the configuration fixes a size.
    pub fn new(config: ViewerConfiguration, renderer: R, viewport: (u32, u32)) -> Self {
        let orientation = Orientation::new(
            config.default_long,
            config.default_lat,
            config.default_fov,
            config.min_fov,
            config.max_fov,
        );
        let autorotate = Autorotation::new(config.time_anim, config.anim_speed);
        let size = config.size.map_or(viewport, |s| (s.width, s.height));

        Self {
            config,
            renderer,
            scene: None,
            orientation,
            autorotate,
            events: EventBus::new(),
            drag: DragState::default(),
            size,
            fullscreen: false,
            now: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &ViewerConfiguration {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn is_ready(&self) -> bool {
        self.scene.is_some()
    }

    pub fn position(&self) -> (f64, f64) {
        (self.orientation.theta(), self.orientation.phi())
    }

    pub fn zoom_level(&self) -> u8 {
        self.orientation.zoom_level()
    }

    /// Degrees.
    pub fn fov(&self) -> f64 {
        self.orientation.fov()
    }

    pub fn is_autorotating(&self) -> bool {
        self.autorotate.is_running()
    }

    pub fn is_autorotate_pending(&self) -> bool {
        self.autorotate.is_pending()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&ViewerEvent) + 'static) {
        self.events.on(kind, handler);
    }

    fn aspect(&self) -> f32 {
        let (w, h) = self.size;
        if h == 0 {
            1.0
        } else {
            w as f32 / h as f32
        }
    }

    /// Reads, parses and decodes the configured panorama, then builds the scene.
    pub fn load(&mut self) -> Result<()> {
        let source = match self.config.panorama.clone() {
            Some(s) => s,
            None => return self.fail_load(ViewerError::Config("no panorama configured".into())),
        };
        match load_panorama(&source, self.config.use_xmp_data) {
            Ok(loaded) => self.install(loaded),
            Err(e) => self.fail_load(e),
        }
    }

    /// Second half of [`Viewer::load`], for panoramas decoded elsewhere
    /// (e.g. on a loader thread).
    pub fn install(&mut self, loaded: LoadedPanorama) -> Result<()> {
        self.stop_autorotate();

        let max_width = working_width(self.renderer.max_texture_width());
        let texture = match compose(&loaded.image, &loaded.metadata, max_width).and_then(|b| b.encode()) {
            Ok(t) => t,
            Err(e) => return self.fail_load(e),
        };

        let (fov, aspect) = (self.orientation.fov() as f32, self.aspect());
        let scene = match self.renderer.create_scene(&texture, fov, aspect) {
            Ok(s) => s,
            Err(e) => return self.fail_load(e),
        };
        self.scene = Some(scene);

        self.render();
        log::info!("panorama ready ({}x{} texture)", texture.width, texture.height);
        self.events.emit(ViewerEvent::Ready);

        self.autorotate.schedule(self.now);
        Ok(())
    }

    /// Reports a failed load. A scene from an earlier load stays untouched.
    pub fn fail_load(&mut self, err: ViewerError) -> Result<()> {
        log::error!("panorama load failed: {}", err);
        self.events.emit(ViewerEvent::LoadFailed {
            reason: err.to_string(),
        });
        Err(err)
    }

    fn render(&mut self) {
        if let Some(scene) = self.scene {
            let dir = self.orientation.look_direction().as_vec3();
            self.renderer.look_at(scene, dir);
            self.renderer.render_frame(scene);
        }
    }

    /// Sets the orientation; latitude is clamped, longitude stored as is.
    pub fn rotate(&mut self, theta: f64, phi: f64) {
        self.orientation.set_position(theta, phi);
        self.render();
        let (theta, phi) = self.position();
        self.events.emit(ViewerEvent::PositionUpdated { theta, phi });
    }

    pub fn zoom(&mut self, level: f64) {
        let level = self.orientation.set_zoom_level(level);
        self.apply_zoom(level);
    }

    fn apply_zoom(&mut self, level: u8) {
        if let Some(scene) = self.scene {
            self.renderer.set_field_of_view(scene, self.orientation.fov() as f32);
        }
        self.render();
        self.events.emit(ViewerEvent::ZoomUpdated { level });
    }

    /// Back to the configured default orientation and field of view.
    pub fn reset_view(&mut self) {
        let (theta, phi) = (self.config.default_long, self.config.default_lat);
        self.rotate(theta, phi);
        let level = self.orientation.set_fov(self.config.default_fov);
        self.apply_zoom(level);
    }

    pub fn zoom_in(&mut self) {
        self.zoom(self.orientation.zoom_in_level() as f64);
    }

    pub fn zoom_out(&mut self) {
        self.zoom(self.orientation.zoom_out_level() as f64);
    }

    /// Does nothing until a panorama is shown.
    pub fn start_autorotate(&mut self) {
        if self.scene.is_none() {
            log::debug!("autorotate requested before the panorama is ready");
            return;
        }
        if self.autorotate.start(self.now) {
            self.events.emit(ViewerEvent::Autorotate { running: true });
        }
    }

    pub fn stop_autorotate(&mut self) {
        if self.autorotate.stop() {
            self.events.emit(ViewerEvent::Autorotate { running: false });
        }
    }

    pub fn toggle_autorotate(&mut self) {
        if self.autorotate.is_running() {
            self.stop_autorotate();
        } else {
            self.start_autorotate();
        }
    }

    /// Replaces the autorotation speed; an unknown unit leaves the old speed.
    pub fn set_animation_speed(&mut self, speed: &str) -> Result<()> {
        let rad_per_sec = parse_speed(speed)?;
        self.autorotate.set_speed(rad_per_sec);
        Ok(())
    }

    /// Last call wins over a configured fixed size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.renderer.resize(self.scene, width, height);
        self.render();
        self.events.emit(ViewerEvent::SizeUpdated { width, height });
    }

    /// Flips the fullscreen flag. Entering fullscreen is up to the host.
    pub fn toggle_fullscreen(&mut self) {
        self.set_fullscreen(!self.fullscreen);
    }

    /// Records a fullscreen change made by the host (e.g. F11 or Esc).
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if self.fullscreen != fullscreen {
            self.fullscreen = fullscreen;
            self.events.emit(ViewerEvent::FullscreenUpdated { fullscreen });
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if !self.config.allow_user_interactions {
            return;
        }
        self.drag = DragState {
            active: true,
            last_x: x,
            last_y: y,
        };
        self.stop_autorotate();
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if !self.drag.active {
            return;
        }
        let (dx, dy) = (x - self.drag.last_x, y - self.drag.last_y);
        self.drag.last_x = x;
        self.drag.last_y = y;
        let (theta, phi) = self
            .orientation
            .drag_target(dx, dy, self.config.long_offset, self.config.lat_offset);
        self.rotate(theta, phi);
    }

    pub fn pointer_up(&mut self) {
        if !self.drag.active {
            return;
        }
        self.drag.active = false;
        if self.is_ready() {
            self.autorotate.schedule(self.now);
        }
    }

    /// One zoom level per wheel notch, in the direction of `delta`.
    pub fn wheel(&mut self, delta: f64) {
        if !self.config.allow_user_interactions || !self.config.allow_scroll_to_zoom {
            return;
        }
        if delta > 0.0 {
            self.zoom_in();
        } else if delta < 0.0 {
            self.zoom_out();
        }
    }

    /// Advances the viewer clock and fires due autorotation timers.
    pub fn update(&mut self, now: Duration) {
        self.now = now.max(self.now);
        while let Some(s) = self.autorotate.poll(self.now) {
            match s {
                AutorotateStep::Started => {
                    self.events.emit(ViewerEvent::Autorotate { running: true });
                }
                AutorotateStep::Tick { offset } => {
                    let (theta, phi) = step(self.orientation.theta(), self.orientation.phi(), offset);
                    self.rotate(theta, phi);
                }
            }
        }
    }
}
