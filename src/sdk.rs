use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::Notify;
use tokio::time::{Duration, Instant, timeout};
use tracing::debug;

/// Vendor event fired when the chat panel opens.
pub const WIDGET_OPENED: &str = "widget_opened";
/// Vendor event fired when the chat panel closes.
pub const WIDGET_CLOSED: &str = "widget_closed";

/// Callback registered on the vendor event bus. Identity (the allocation
/// behind the `Arc`) is what [`WidgetSdk::off`] matches on.
pub type EventCallback = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// One-shot callback run once the widget reports itself loaded.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Runtime surface of the widget object the vendor script publishes.
///
/// The real implementation lives behind whatever bridge the host runs
/// (webview evaluation, wasm interop); this crate only defines the seam,
/// plus [`NullSdk`] and [`StubSdk`] for the absent and headless cases.
pub trait WidgetSdk: Send + Sync {
    fn open(&self);
    fn close(&self);
    fn toggle(&self);
    fn is_open(&self) -> bool;
    fn send_message(&self, text: &str, conversation_id: Option<&str>);
    fn show_greeting(&self, message: Option<&str>);
    fn hide_greeting(&self);
    fn get_config(&self) -> Map<String, Value>;
    fn set_debug(&self, enabled: bool);
    fn on(&self, event: &str, callback: EventCallback);
    fn off(&self, event: &str, callback: &EventCallback);
    fn emit(&self, event: &str, data: Option<Value>);
    fn ready(&self, callback: ReadyCallback);
    fn track(&self, event_name: &str, properties: Option<Value>);
}

/// Widget that is not there. Calls do nothing, `is_open` is false,
/// `get_config` is empty, ready callbacks are dropped (never invoked).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSdk;

impl WidgetSdk for NullSdk {
    fn open(&self) {}
    fn close(&self) {}
    fn toggle(&self) {}
    fn is_open(&self) -> bool {
        false
    }
    fn send_message(&self, _text: &str, _conversation_id: Option<&str>) {}
    fn show_greeting(&self, _message: Option<&str>) {}
    fn hide_greeting(&self) {}
    fn get_config(&self) -> Map<String, Value> {
        Map::new()
    }
    fn set_debug(&self, _enabled: bool) {}
    fn on(&self, _event: &str, _callback: EventCallback) {}
    fn off(&self, _event: &str, _callback: &EventCallback) {}
    fn emit(&self, _event: &str, _data: Option<Value>) {}
    fn ready(&self, _callback: ReadyCallback) {}
    fn track(&self, _event_name: &str, _properties: Option<Value>) {}
}

/// Message handed to [`WidgetSdk::send_message`], as recorded by [`StubSdk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub text: String,
    pub conversation_id: Option<String>,
}

/// Analytics event handed to [`WidgetSdk::track`], as recorded by [`StubSdk`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub name: String,
    pub properties: Option<Value>,
}

/// In-process widget implementation for headless hosts and tests: keeps the
/// open flag, dispatches emitted events to registered listeners, and records
/// messages and tracked events instead of talking to a vendor bundle.
#[derive(Default)]
pub struct StubSdk {
    open: AtomicBool,
    debug: AtomicBool,
    config: Mutex<Map<String, Value>>,
    listeners: Mutex<HashMap<String, Vec<EventCallback>>>,
    messages: Mutex<Vec<SentMessage>>,
    tracks: Mutex<Vec<TrackedEvent>>,
}

impl StubSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Map<String, Value>) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        lock(&self.messages).clone()
    }

    pub fn tracked_events(&self) -> Vec<TrackedEvent> {
        lock(&self.tracks).clone()
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn dispatch(&self, event: &str, data: Option<&Value>) {
        let callbacks = lock(&self.listeners).get(event).cloned().unwrap_or_default();
        for callback in callbacks {
            callback(data);
        }
    }
}

impl WidgetSdk for StubSdk {
    fn open(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            self.dispatch(WIDGET_OPENED, None);
        }
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.dispatch(WIDGET_CLOSED, None);
        }
    }

    fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_message(&self, text: &str, conversation_id: Option<&str>) {
        lock(&self.messages).push(SentMessage {
            text: text.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        });
    }

    fn show_greeting(&self, message: Option<&str>) {
        self.dispatch("greeting_shown", message.map(|m| Value::String(m.to_string())).as_ref());
    }

    fn hide_greeting(&self) {
        self.dispatch("greeting_hidden", None);
    }

    fn get_config(&self) -> Map<String, Value> {
        lock(&self.config).clone()
    }

    fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    fn on(&self, event: &str, callback: EventCallback) {
        lock(&self.listeners)
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    fn off(&self, event: &str, callback: &EventCallback) {
        if let Some(callbacks) = lock(&self.listeners).get_mut(event) {
            callbacks.retain(|existing| {
                !std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(callback))
            });
        }
    }

    fn emit(&self, event: &str, data: Option<Value>) {
        self.dispatch(event, data.as_ref());
    }

    fn ready(&self, callback: ReadyCallback) {
        // The stub is loaded by construction.
        callback();
    }

    fn track(&self, event_name: &str, properties: Option<Value>) {
        lock(&self.tracks).push(TrackedEvent {
            name: event_name.to_string(),
            properties,
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The single page-wide slot the vendor bridge publishes the SDK into.
///
/// Mirrors the global object the widget script attaches to the page: one
/// writer (the host bridge, on script load), many observers. The slot holds
/// a weak reference; the bridge keeps ownership, and dropping the bridge
/// empties the slot. Consumers go through [`crate::handle::WidgetHandle`]
/// rather than reading the slot ad hoc.
pub struct SdkRegistry {
    slot: RwLock<Weak<dyn WidgetSdk>>,
    ready: Notify,
}

impl SdkRegistry {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Weak::<NullSdk>::new()),
            ready: Notify::new(),
        }
    }

    /// Publishes the loaded SDK and wakes every [`Self::wait_ready`] caller.
    pub fn publish(&self, sdk: &Arc<dyn WidgetSdk>) {
        *write(&self.slot) = Arc::downgrade(sdk);
        self.ready.notify_waiters();
    }

    /// Empties the slot, e.g. when the host tears the vendor bundle down.
    pub fn unpublish(&self) {
        *write(&self.slot) = Weak::<NullSdk>::new();
    }

    /// Current SDK, if one is published and still alive.
    pub fn get(&self) -> Option<Arc<dyn WidgetSdk>> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }

    /// Waits for a publication, bounded by an absolute timeout. Returns
    /// `None` when the limit passes first. There is no periodic re-check to
    /// leak; publication wakes waiters directly.
    pub async fn wait_ready(&self, limit: Duration) -> Option<Arc<dyn WidgetSdk>> {
        let deadline = Instant::now() + limit;
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(sdk) = self.get() {
                return Some(sdk);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if timeout(remaining, notified).await.is_err() {
                debug!("no SDK was published before the readiness deadline");
                return None;
            }
        }
    }
}

impl Default for SdkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn write(
    slot: &RwLock<Weak<dyn WidgetSdk>>,
) -> std::sync::RwLockWriteGuard<'_, Weak<dyn WidgetSdk>> {
    slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stub_tracks_open_state_and_events() {
        let sdk = StubSdk::new();
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = opened.clone();
        let callback: EventCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sdk.on(WIDGET_OPENED, callback.clone());

        sdk.open();
        sdk.open(); // second open is a no-op, no second event
        assert!(sdk.is_open());
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        sdk.toggle();
        assert!(!sdk.is_open());

        sdk.off(WIDGET_OPENED, &callback);
        sdk.open();
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stub_records_messages_and_tracks() {
        let sdk = StubSdk::new();
        sdk.send_message("hello", Some("conv-1"));
        sdk.track("cta_clicked", Some(json!({"source": "header"})));

        assert_eq!(
            sdk.sent_messages(),
            vec![SentMessage {
                text: "hello".into(),
                conversation_id: Some("conv-1".into()),
            }]
        );
        assert_eq!(sdk.tracked_events()[0].name, "cta_clicked");
    }

    #[test]
    fn stub_runs_ready_immediately() {
        let sdk = StubSdk::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        sdk.ready(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn registry_observes_without_owning() {
        let registry = SdkRegistry::new();
        assert!(registry.get().is_none());

        let sdk: Arc<dyn WidgetSdk> = Arc::new(StubSdk::new());
        registry.publish(&sdk);
        assert!(registry.get().is_some());

        drop(sdk);
        assert!(registry.get().is_none());
    }

    #[test]
    fn unpublish_empties_the_slot() {
        let registry = SdkRegistry::new();
        let sdk: Arc<dyn WidgetSdk> = Arc::new(StubSdk::new());
        registry.publish(&sdk);
        registry.unpublish();
        assert!(registry.get().is_none());
    }

    #[tokio::test]
    async fn wait_ready_sees_a_late_publication() {
        let registry = Arc::new(SdkRegistry::new());
        let sdk: Arc<dyn WidgetSdk> = Arc::new(StubSdk::new());

        let publisher = registry.clone();
        let published = sdk.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(&published);
        });

        let found = registry.wait_ready(Duration::from_secs(5)).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn wait_ready_times_out_cleanly() {
        let registry = SdkRegistry::new();
        let found = registry.wait_ready(Duration::from_millis(10)).await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn wait_ready_returns_an_already_published_sdk_at_once() {
        let registry = SdkRegistry::new();
        let sdk: Arc<dyn WidgetSdk> = Arc::new(StubSdk::new());
        registry.publish(&sdk);
        let found = registry.wait_ready(Duration::from_millis(1)).await;
        assert!(found.is_some());
    }
}
