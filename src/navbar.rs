// navbar.rs — 底部导航栏：自动旋转、缩放条、全屏、标题

use crate::events::ViewerEvent;
use crate::geometry::MAX_ZOOM_LEVEL;
use crate::i18n::tr;

/// User request coming out of the navigation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavBarAction {
    ToggleAutorotate,
    ZoomIn,
    ZoomOut,
    ZoomTo(u8),
    ToggleFullscreen,
}

pub trait NavBarButton {
    /// Draws the button and reports what the user asked for, if anything.
    fn show(&mut self, ui: &mut egui::Ui) -> Option<NavBarAction>;

    fn set_active(&mut self, active: bool);

    fn is_active(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct AutorotateButton {
    active: bool,
}

impl NavBarButton for AutorotateButton {
    fn show(&mut self, ui: &mut egui::Ui) -> Option<NavBarAction> {
        ui.selectable_label(self.active, "⟳")
            .on_hover_text(tr("navbar.autorotate"))
            .clicked()
            .then_some(NavBarAction::ToggleAutorotate)
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Zoom out / slider / zoom in. "Active" while the slider is being dragged.
#[derive(Debug, Default)]
pub struct ZoomRange {
    level: u8,
    dragging: bool,
}

impl ZoomRange {
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(MAX_ZOOM_LEVEL);
    }
}

impl NavBarButton for ZoomRange {
    fn show(&mut self, ui: &mut egui::Ui) -> Option<NavBarAction> {
        let mut action = None;
        if ui.button("−").on_hover_text(tr("navbar.zoom_out")).clicked() {
            action = Some(NavBarAction::ZoomOut);
        }

        let mut level = self.level;
        let slider = ui.add(egui::Slider::new(&mut level, 0..=MAX_ZOOM_LEVEL).show_value(false));
        self.set_active(slider.dragged());
        if slider.changed() {
            self.level = level;
            action = Some(NavBarAction::ZoomTo(level));
        }

        if ui.button("+").on_hover_text(tr("navbar.zoom_in")).clicked() {
            action = Some(NavBarAction::ZoomIn);
        }
        action
    }

    fn set_active(&mut self, active: bool) {
        self.dragging = active;
    }

    fn is_active(&self) -> bool {
        self.dragging
    }
}

#[derive(Debug, Default)]
pub struct FullscreenButton {
    active: bool,
}

impl NavBarButton for FullscreenButton {
    fn show(&mut self, ui: &mut egui::Ui) -> Option<NavBarAction> {
        ui.selectable_label(self.active, "⛶")
            .on_hover_text(tr("navbar.fullscreen"))
            .clicked()
            .then_some(NavBarAction::ToggleFullscreen)
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Default)]
pub struct NavBar {
    pub autorotate: AutorotateButton,
    pub zoom: ZoomRange,
    pub fullscreen: FullscreenButton,
    pub caption: Option<String>,
}

impl NavBar {
    pub fn new(caption: Option<String>) -> Self {
        Self {
            caption,
            ..Default::default()
        }
    }

    /// Keeps button states in line with what the viewer reports.
    pub fn apply_event(&mut self, event: &ViewerEvent) {
        match *event {
            ViewerEvent::Autorotate { running } => self.autorotate.set_active(running),
            ViewerEvent::ZoomUpdated { level } => {
                if !self.zoom.is_active() {
                    self.zoom.set_level(level);
                }
            }
            ViewerEvent::FullscreenUpdated { fullscreen } => self.fullscreen.set_active(fullscreen),
            _ => {}
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Vec<NavBarAction> {
        let mut actions = Vec::new();
        egui::TopBottomPanel::bottom("navbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let buttons: [&mut dyn NavBarButton; 3] = [&mut self.autorotate, &mut self.zoom, &mut self.fullscreen];
                for button in buttons {
                    actions.extend(button.show(ui));
                }
                if let Some(caption) = &self.caption {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(caption);
                    });
                }
            });
        });
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_sync_button_state() {
        let mut bar = NavBar::new(Some("Lake".into()));
        bar.apply_event(&ViewerEvent::Autorotate { running: true });
        bar.apply_event(&ViewerEvent::FullscreenUpdated { fullscreen: true });
        bar.apply_event(&ViewerEvent::ZoomUpdated { level: 42 });
        assert!(bar.autorotate.is_active());
        assert!(bar.fullscreen.is_active());
        assert_eq!(bar.zoom.level(), 42);

        bar.apply_event(&ViewerEvent::Autorotate { running: false });
        assert!(!bar.autorotate.is_active());
    }

    #[test]
    fn dragging_slider_ignores_zoom_echo() {
        let mut bar = NavBar::default();
        bar.zoom.set_level(10);
        bar.zoom.set_active(true);
        bar.apply_event(&ViewerEvent::ZoomUpdated { level: 80 });
        assert_eq!(bar.zoom.level(), 10);
    }

    #[test]
    fn renders_headless_without_actions() {
        let ctx = egui::Context::default();
        let mut bar = NavBar::new(Some("caption".into()));
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| actions = bar.show(ctx));
        assert!(actions.is_empty());
    }
}
