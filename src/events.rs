// events.rs — 查看器事件与订阅分发

use std::collections::HashMap;

/// Tag used to subscribe to a family of [`ViewerEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    LoadFailed,
    PositionUpdated,
    ZoomUpdated,
    Autorotate,
    SizeUpdated,
    FullscreenUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Ready,
    LoadFailed { reason: String },
    PositionUpdated { theta: f64, phi: f64 },
    ZoomUpdated { level: u8 },
    Autorotate { running: bool },
    SizeUpdated { width: u32, height: u32 },
    FullscreenUpdated { fullscreen: bool },
}

impl ViewerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ViewerEvent::Ready => EventKind::Ready,
            ViewerEvent::LoadFailed { .. } => EventKind::LoadFailed,
            ViewerEvent::PositionUpdated { .. } => EventKind::PositionUpdated,
            ViewerEvent::ZoomUpdated { .. } => EventKind::ZoomUpdated,
            ViewerEvent::Autorotate { .. } => EventKind::Autorotate,
            ViewerEvent::SizeUpdated { .. } => EventKind::SizeUpdated,
            ViewerEvent::FullscreenUpdated { .. } => EventKind::FullscreenUpdated,
        }
    }
}

type Handler = Box<dyn FnMut(&ViewerEvent)>;

/// Synchronous dispatch; handlers run in subscription order.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&ViewerEvent) + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    pub fn emit(&mut self, event: ViewerEvent) {
        if let Some(list) = self.handlers.get_mut(&event.kind()) {
            for h in list.iter_mut() {
                h(&event);
            }
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}
