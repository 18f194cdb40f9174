use crate::config::{self, WidgetConfig};
use crate::dom::{ScriptDom, ScriptHandle};
use crate::script::{MARKER_ATTR, ScriptSpec};
use crate::sdk::{SdkRegistry, WidgetSdk};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// Identifies one activation-to-deactivation lifetime. Load and error
/// signals carry it back so signals for a torn-down session can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountToken(Uuid);

/// Where the controller is in the injection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Idle,
    Initializing,
    Ready,
    TornDown,
}

/// What an activation did, for hosts that care to observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// A script element was appended. Lifecycle signals must quote the token.
    Injected(MountToken),
    /// This controller already ran its injection for the current session.
    AlreadyMounted,
    /// Another script element for the widget is in the document.
    AlreadyPresent,
    /// No document to inject into (headless or server-side render pass).
    Unsupported,
    /// The document refused the element; the controller stayed idle.
    Failed,
}

struct Session {
    token: MountToken,
    script: Option<ScriptHandle>,
    sdk: Option<Arc<dyn WidgetSdk>>,
}

/// Owns at-most-once injection of the widget script per logical mount.
///
/// The controller lives on the host's UI thread and is driven entirely by
/// lifecycle calls: `activate`/`deactivate` from the host's mount cycle,
/// `script_loaded`/`script_failed` relayed from the environment whenever
/// they happen to arrive. Repeated activate/deactivate/activate cycles
/// (the development-mode double-invoke pattern) never leave more than one
/// script element in the document.
pub struct MountController {
    dom: Option<Rc<dyn ScriptDom>>,
    registry: Arc<SdkRegistry>,
    page_origin: Option<Url>,
    state: MountState,
    session: Option<Session>,
}

impl MountController {
    pub fn new(dom: Rc<dyn ScriptDom>, registry: Arc<SdkRegistry>) -> Self {
        Self {
            dom: Some(dom),
            registry,
            page_origin: None,
            state: MountState::Idle,
            session: None,
        }
    }

    /// Controller with no document attached; every activation is a silent
    /// no-op. For render passes that run where no page exists.
    pub fn detached(registry: Arc<SdkRegistry>) -> Self {
        Self {
            dom: None,
            registry,
            page_origin: None,
            state: MountState::Idle,
            session: None,
        }
    }

    /// Origin relative `api_url` overrides resolve against.
    pub fn with_page_origin(mut self, origin: Url) -> Self {
        self.page_origin = Some(origin);
        self
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn active_token(&self) -> Option<MountToken> {
        self.session.as_ref().map(|session| session.token)
    }

    /// The SDK handle captured when this session's script finished loading.
    pub fn sdk_handle(&self) -> Option<Arc<dyn WidgetSdk>> {
        self.session.as_ref().and_then(|session| session.sdk.clone())
    }

    /// Injects the widget script element, at most once per session.
    ///
    /// A malformed site id only warns; the identifier format is owned by
    /// the vendor, so injection proceeds regardless.
    pub fn activate(&mut self, config: &WidgetConfig) -> ActivationOutcome {
        let Some(dom) = self.dom.clone() else {
            return ActivationOutcome::Unsupported;
        };
        if matches!(self.state, MountState::Initializing | MountState::Ready) {
            debug!("widget already mounted for this session; ignoring activation");
            return ActivationOutcome::AlreadyMounted;
        }
        if !config::site_id_looks_valid(&config.site_id) {
            warn!(
                site_id = %config.site_id,
                "site id looks malformed; check the value from your BubblaV dashboard"
            );
        }

        let spec = ScriptSpec::for_config(config, self.page_origin.as_ref());
        if dom.find_widget_script(&spec.src, MARKER_ATTR) {
            warn!(
                src = %spec.src,
                "widget script already present in the document; only one widget instance should be active"
            );
            return ActivationOutcome::AlreadyPresent;
        }

        match dom.append_script(&spec) {
            Ok(handle) => {
                let token = MountToken(Uuid::new_v4());
                self.session = Some(Session {
                    token,
                    script: Some(handle),
                    sdk: None,
                });
                self.state = MountState::Initializing;
                debug!(src = %spec.src, "widget script appended");
                ActivationOutcome::Injected(token)
            }
            Err(err) => {
                warn!(%err, "failed to append the widget script element");
                ActivationOutcome::Failed
            }
        }
    }

    /// Host-relayed load signal. Signals quoting a token other than the
    /// active session's arrive after teardown or re-activation and are
    /// dropped without touching any handle.
    pub fn script_loaded(&mut self, token: MountToken) {
        if !self.is_active(token) {
            debug!("ignoring a load signal for a torn-down widget session");
            return;
        }
        let sdk = self.registry.get();
        if sdk.is_none() {
            debug!("widget script loaded but no SDK has been published yet");
        }
        if let Some(session) = self.session.as_mut() {
            session.sdk = sdk;
        }
        self.state = MountState::Ready;
    }

    /// Host-relayed error signal. Removes the dead element so the duplicate
    /// guard cannot block the retry, and resets for a host-driven
    /// re-activation; there is no automatic retry loop.
    pub fn script_failed(&mut self, token: MountToken) {
        if !self.is_active(token) {
            debug!("ignoring an error signal for a torn-down widget session");
            return;
        }
        warn!("widget script failed to load; the widget stays inactive until the host activates again");
        self.teardown_session();
        self.state = MountState::TornDown;
    }

    /// Tears the session down: removes the script element this session owns
    /// (never one it did not create) and clears both handles. Idempotent,
    /// and safe to call when never activated.
    pub fn deactivate(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.teardown_session();
        self.state = MountState::TornDown;
    }

    fn is_active(&self, token: MountToken) -> bool {
        matches!(self.state, MountState::Initializing | MountState::Ready)
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.token == token)
    }

    fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let (Some(dom), Some(script)) = (self.dom.as_ref(), session.script.take())
                && !dom.remove_script(&script)
            {
                debug!("owned script element was already gone at teardown");
            }
        }
    }
}
