//! Host-driven embedding runtime for the BubblaV chat widget.
//!
//! The crate owns the script-injection lifecycle: inject the vendor
//! `<script>` element at most once per mount, hand configuration over as
//! `data-*` attributes, and tear down cleanly, all while tolerating the
//! rapid activate/deactivate/activate cycles development-mode hosts
//! produce. The widget itself (its protocol and rendering) stays with the
//! vendor bundle; hosts relay its load/error signals and publish the SDK
//! bridge into the [`SdkRegistry`] when it appears.
//!
//! ```
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use bubblav_widget::{
//!     ActivationOutcome, HtmlPage, MountController, ScriptDom, SdkRegistry, WidgetConfig,
//! };
//!
//! let page = Rc::new(HtmlPage::empty());
//! let registry = Arc::new(SdkRegistry::new());
//! let mut controller = MountController::new(page.clone(), registry);
//!
//! let outcome = controller.activate(&WidgetConfig::new("site-42"));
//! assert!(matches!(outcome, ActivationOutcome::Injected(_)));
//! assert_eq!(page.script_count(), 1);
//!
//! controller.deactivate();
//! assert_eq!(page.script_count(), 0);
//! ```

pub mod attrs;
pub mod config;
pub mod dom;
pub mod embed;
pub mod handle;
pub mod mount;
pub mod script;
pub mod sdk;

pub use attrs::{data_attribute_name, data_attributes};
pub use config::{MAX_SITE_ID_LEN, WidgetConfig, WidgetPosition, site_id_looks_valid};
pub use dom::{DomError, HtmlPage, ScriptDom, ScriptHandle};
pub use embed::inject_into_html;
pub use handle::{EventSubscription, OpenState, WidgetHandle, subscribe};
pub use mount::{ActivationOutcome, MountController, MountState, MountToken};
pub use script::{
    DEFAULT_WIDGET_URL, MARKER_ATTR, SITE_ID_ATTR, ScriptSpec, widget_script_url,
};
pub use sdk::{
    EventCallback, NullSdk, ReadyCallback, SdkRegistry, SentMessage, StubSdk, TrackedEvent,
    WIDGET_CLOSED, WIDGET_OPENED, WidgetSdk,
};
