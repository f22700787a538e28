//! Handler registry: explicit handler configuration with a process-wide fallback.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::progress::handlers::beep::BeepConfig;
use crate::progress::handlers::text_bar::TextBarConfig;
use crate::progress::handlers::webhook::WebhookConfig;
use crate::progress::handlers::{
    BeepHandler, DebugHandler, Handler, HandlerFactory, TextBarHandler, VoidHandler,
    WebhookHandler,
};

/// Declarative description of one handler.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerSpec {
    TextBar(TextBarConfig),
    Beep(BeepConfig),
    Webhook(WebhookConfig),
    Debug,
    Void,
    /// Programmatic handler; not expressible in configuration files.
    #[serde(skip)]
    Custom(Arc<dyn HandlerFactory>),
}

impl std::fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerSpec::TextBar(config) => f.debug_tuple("TextBar").field(config).finish(),
            HandlerSpec::Beep(config) => f.debug_tuple("Beep").field(config).finish(),
            HandlerSpec::Webhook(config) => f.debug_tuple("Webhook").field(config).finish(),
            HandlerSpec::Debug => write!(f, "Debug"),
            HandlerSpec::Void => write!(f, "Void"),
            HandlerSpec::Custom(factory) => f.debug_tuple("Custom").field(&factory.name()).finish(),
        }
    }
}

impl HandlerSpec {
    /// Spec for a handler name with default settings. Webhooks need a url and
    /// are not available by name.
    pub fn from_name(name: &str) -> Result<Self, String> {
        match name.replace('-', "_").as_str() {
            "text_bar" | "txt" => Ok(HandlerSpec::TextBar(TextBarConfig::default())),
            "beep" => Ok(HandlerSpec::Beep(BeepConfig::default())),
            "debug" => Ok(HandlerSpec::Debug),
            "void" => Ok(HandlerSpec::Void),
            "webhook" => Err("webhook handler requires a url; configure it in config.toml".to_string()),
            other => Err(format!("Unknown handler '{}'", other)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            HandlerSpec::TextBar(_) => "text_bar",
            HandlerSpec::Beep(_) => "beep",
            HandlerSpec::Webhook(_) => "webhook",
            HandlerSpec::Debug => "debug",
            HandlerSpec::Void => "void",
            HandlerSpec::Custom(factory) => factory.name(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            HandlerSpec::TextBar(config) if config.width == 0 => {
                Err("text_bar width must be at least 1".to_string())
            }
            HandlerSpec::Webhook(config) => config.validate(),
            _ => Ok(()),
        }
    }

    /// Build a fresh handler instance.
    pub fn build(&self) -> Box<dyn Handler> {
        match self {
            HandlerSpec::TextBar(config) => Box::new(TextBarHandler::new(config.clone())),
            HandlerSpec::Beep(config) => Box::new(BeepHandler::new(config.clone())),
            HandlerSpec::Webhook(config) => Box::new(WebhookHandler::new(config.clone())),
            HandlerSpec::Debug => Box::new(DebugHandler::new()),
            HandlerSpec::Void => Box::new(VoidHandler),
            HandlerSpec::Custom(factory) => factory.build(),
        }
    }
}

/// Ordered handler set consulted when a scope is entered.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    specs: Vec<HandlerSpec>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used when nothing else is configured: one text bar.
    pub fn builtin() -> Self {
        Self::new().with(HandlerSpec::TextBar(TextBarConfig::default()))
    }

    pub fn from_specs(specs: Vec<HandlerSpec>) -> Self {
        Self { specs }
    }

    pub fn with(mut self, spec: HandlerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn with_factory(self, factory: impl HandlerFactory + 'static) -> Self {
        self.with(HandlerSpec::Custom(Arc::new(factory)))
    }

    pub fn push(&mut self, spec: HandlerSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[HandlerSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .specs
            .iter()
            .filter_map(|spec| spec.validate().err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Instantiate one handler per spec, in order.
    pub fn build(&self) -> Vec<Box<dyn Handler>> {
        self.specs.iter().map(HandlerSpec::build).collect()
    }
}

static DEFAULT_REGISTRY: RwLock<Option<HandlerRegistry>> = parking_lot::const_rwlock(None);

/// Replace the process-wide default handlers.
pub fn set_default_handlers(registry: HandlerRegistry) {
    debug!(handlers = ?registry.names(), "default progress handlers replaced");
    *DEFAULT_REGISTRY.write() = Some(registry);
}

/// Copy of the process-wide default handlers.
pub fn default_handlers() -> HandlerRegistry {
    DEFAULT_REGISTRY
        .read()
        .clone()
        .unwrap_or_else(HandlerRegistry::builtin)
}

/// Restore the built-in default.
pub fn reset_default_handlers() {
    *DEFAULT_REGISTRY.write() = None;
}
