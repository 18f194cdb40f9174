use crate::sdk::{
    EventCallback, ReadyCallback, SdkRegistry, WIDGET_CLOSED, WIDGET_OPENED, WidgetSdk,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Null-safe consumer facade over the registry slot.
///
/// Implements [`WidgetSdk`] by forwarding to whatever is currently
/// published; while nothing is, calls degrade to the [`crate::sdk::NullSdk`]
/// defaults instead of surfacing an absent object. Cheap to clone and hand
/// to every part of the host that wants to drive the widget.
#[derive(Clone)]
pub struct WidgetHandle {
    registry: Arc<SdkRegistry>,
}

impl WidgetHandle {
    pub fn new(registry: Arc<SdkRegistry>) -> Self {
        Self { registry }
    }

    /// Whether the vendor SDK is currently published.
    pub fn is_ready(&self) -> bool {
        self.registry.get().is_some()
    }

    fn with_sdk(&self, call: impl FnOnce(&Arc<dyn WidgetSdk>)) {
        if let Some(sdk) = self.registry.get() {
            call(&sdk);
        }
    }
}

impl WidgetSdk for WidgetHandle {
    fn open(&self) {
        self.with_sdk(|sdk| sdk.open());
    }

    fn close(&self) {
        self.with_sdk(|sdk| sdk.close());
    }

    fn toggle(&self) {
        self.with_sdk(|sdk| sdk.toggle());
    }

    fn is_open(&self) -> bool {
        self.registry.get().map(|sdk| sdk.is_open()).unwrap_or(false)
    }

    fn send_message(&self, text: &str, conversation_id: Option<&str>) {
        self.with_sdk(|sdk| sdk.send_message(text, conversation_id));
    }

    fn show_greeting(&self, message: Option<&str>) {
        self.with_sdk(|sdk| sdk.show_greeting(message));
    }

    fn hide_greeting(&self) {
        self.with_sdk(|sdk| sdk.hide_greeting());
    }

    fn get_config(&self) -> Map<String, Value> {
        self.registry
            .get()
            .map(|sdk| sdk.get_config())
            .unwrap_or_default()
    }

    fn set_debug(&self, enabled: bool) {
        self.with_sdk(|sdk| sdk.set_debug(enabled));
    }

    fn on(&self, event: &str, callback: EventCallback) {
        self.with_sdk(|sdk| sdk.on(event, callback));
    }

    fn off(&self, event: &str, callback: &EventCallback) {
        self.with_sdk(|sdk| sdk.off(event, callback));
    }

    fn emit(&self, event: &str, data: Option<Value>) {
        self.with_sdk(|sdk| sdk.emit(event, data));
    }

    fn ready(&self, callback: ReadyCallback) {
        match self.registry.get() {
            Some(sdk) => sdk.ready(callback),
            None => debug!("ready callback dropped; no SDK is published yet"),
        }
    }

    fn track(&self, event_name: &str, properties: Option<Value>) {
        self.with_sdk(|sdk| sdk.track(event_name, properties));
    }
}

/// Registration on the vendor event bus, deregistered on drop.
pub struct EventSubscription {
    sdk: Weak<dyn WidgetSdk>,
    event: String,
    callback: EventCallback,
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(sdk) = self.sdk.upgrade() {
            sdk.off(&self.event, &self.callback);
        }
    }
}

/// Registers `callback` for `event` on the published SDK for as long as the
/// returned guard lives.
///
/// Returns `None` while no SDK is published: nothing is queued, and the
/// caller re-subscribes once the registry reports ready.
pub fn subscribe(
    registry: &SdkRegistry,
    event: &str,
    callback: EventCallback,
) -> Option<EventSubscription> {
    let Some(sdk) = registry.get() else {
        debug!(event, "no SDK published yet; subscription not established");
        return None;
    };
    sdk.on(event, callback.clone());
    Some(EventSubscription {
        sdk: Arc::downgrade(&sdk),
        event: event.to_string(),
        callback,
    })
}

/// Tracks the chat panel's open/closed state from the vendor's
/// `widget_opened`/`widget_closed` events, so hosts can answer "is the
/// panel open" without another SDK round trip. Detaches on drop.
pub struct OpenState {
    open: Arc<AtomicBool>,
    _subscriptions: [EventSubscription; 2],
}

impl OpenState {
    /// Attaches to the published SDK; `None` while there is none.
    pub fn attach(registry: &SdkRegistry) -> Option<Self> {
        let open = Arc::new(AtomicBool::new(false));

        let seen_open = open.clone();
        let on_open: EventCallback = Arc::new(move |_| seen_open.store(true, Ordering::SeqCst));
        let seen_close = open.clone();
        let on_close: EventCallback = Arc::new(move |_| seen_close.store(false, Ordering::SeqCst));

        let opened = subscribe(registry, WIDGET_OPENED, on_open)?;
        let closed = subscribe(registry, WIDGET_CLOSED, on_close)?;

        // Attaching after the panel opened should not report closed.
        if let Some(sdk) = registry.get() {
            open.store(sdk.is_open(), Ordering::SeqCst);
        }

        Some(Self {
            open,
            _subscriptions: [opened, closed],
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
