//! User-activity signals consumed by the inactivity monitor.
//!
//! A host exposes its input events through [`ActivitySource`]. The bundled
//! [`DocumentEvents`] is an in-process implementation: the host calls
//! [`dispatch`](DocumentEvents::dispatch) and
//! [`set_visibility`](DocumentEvents::set_visibility), and every attached
//! listener receives the matching signals.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Input events that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
    Click,
}

impl InputKind {
    /// Every kind the inactivity monitor listens to.
    pub const TRACKED: [InputKind; 6] = [
        InputKind::PointerDown,
        InputKind::PointerMove,
        InputKind::KeyDown,
        InputKind::Scroll,
        InputKind::TouchStart,
        InputKind::Click,
    ];
}

/// Whether the surface is in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    Input(InputKind),
    Visibility(Visibility),
}

/// Something that can deliver activity signals.
pub trait ActivitySource: Send + Sync {
    /// Start listening for `kinds` plus visibility changes. Dropping the
    /// returned listener detaches it.
    fn attach(&self, kinds: &[InputKind]) -> ActivityListener;

    /// Visibility at the moment of the call.
    fn visibility(&self) -> Visibility {
        Visibility::Visible
    }
}

/// An attached listener. Detaches on drop.
pub struct ActivityListener {
    rx: mpsc::UnboundedReceiver<ActivitySignal>,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ActivityListener {
    pub fn new(
        rx: mpsc::UnboundedReceiver<ActivitySignal>,
        detach: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx,
            detach: Some(Box::new(detach)),
        }
    }

    /// Next signal, or `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<ActivitySignal> {
        self.rx.recv().await
    }
}

impl Drop for ActivityListener {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

struct Registration {
    kinds: Vec<InputKind>,
    tx: mpsc::UnboundedSender<ActivitySignal>,
}

#[derive(Default)]
struct DocumentState {
    next_id: u64,
    listeners: HashMap<u64, Registration>,
    visibility: Visibility,
}

/// In-process activity source. Clone to share.
#[derive(Clone, Default)]
pub struct DocumentEvents {
    state: Arc<Mutex<DocumentState>>,
}

impl DocumentEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an input event to every listener interested in `kind`.
    pub fn dispatch(&self, kind: InputKind) {
        let state = self.state.lock();
        for registration in state.listeners.values() {
            if registration.kinds.contains(&kind) {
                let _ = registration.tx.send(ActivitySignal::Input(kind));
            }
        }
    }

    /// Change visibility. Listeners hear about actual changes only.
    pub fn set_visibility(&self, visibility: Visibility) {
        let mut state = self.state.lock();
        if state.visibility == visibility {
            return;
        }
        state.visibility = visibility;
        for registration in state.listeners.values() {
            let _ = registration.tx.send(ActivitySignal::Visibility(visibility));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

impl ActivitySource for DocumentEvents {
    fn attach(&self, kinds: &[InputKind]) -> ActivityListener {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(
                id,
                Registration {
                    kinds: kinds.to_vec(),
                    tx,
                },
            );
            id
        };

        let weak: Weak<Mutex<DocumentState>> = Arc::downgrade(&self.state);
        ActivityListener::new(rx, move || {
            if let Some(state) = weak.upgrade() {
                state.lock().listeners.remove(&id);
            }
        })
    }

    fn visibility(&self) -> Visibility {
        self.state.lock().visibility
    }
}
