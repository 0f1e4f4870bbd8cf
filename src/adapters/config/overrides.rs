use std::sync::{PoisonError, RwLock};

use crate::domain::Settings;
use crate::ports::ConfigPort;

#[derive(Debug, Default, Clone)]
struct Overrides {
    auto_discover: Option<bool>,
    auto_config_url: Option<String>,
    proxy: Option<String>,
    bypass_list: Option<String>,
}

/// Wraps a configuration reader with values that take precedence over it.
pub struct OverrideConfig<C> {
    inner: C,
    overrides: RwLock<Overrides>,
}

impl<C: ConfigPort> OverrideConfig<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            overrides: RwLock::new(Overrides::default()),
        }
    }

    /// Seed overrides from the settings file.
    pub fn from_settings(inner: C, settings: &Settings) -> Self {
        let config = Self::new(inner);
        config.set_auto_discover(settings.auto_discover);
        config.set_auto_config_url(settings.auto_config_url.clone());
        config.set_proxy(settings.proxy.clone());
        config.set_bypass_list(settings.bypass_list.clone());
        config
    }

    fn update(&self, apply: impl FnOnce(&mut Overrides)) {
        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut overrides);
    }

    fn read(&self) -> Overrides {
        self.overrides.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_auto_discover(&self, value: Option<bool>) {
        self.update(|o| o.auto_discover = value);
    }

    pub fn set_auto_config_url(&self, value: Option<String>) {
        self.update(|o| o.auto_config_url = value.filter(|v| !v.is_empty()));
    }

    /// Manual proxy used for every scheme.
    pub fn set_proxy(&self, value: Option<String>) {
        self.update(|o| o.proxy = value.filter(|v| !v.is_empty()));
    }

    pub fn set_bypass_list(&self, value: Option<String>) {
        self.update(|o| o.bypass_list = value.filter(|v| !v.is_empty()));
    }
}

impl<C: ConfigPort> ConfigPort for OverrideConfig<C> {
    fn get_auto_discover(&self) -> bool {
        self.read()
            .auto_discover
            .unwrap_or_else(|| self.inner.get_auto_discover())
    }

    fn get_auto_config_url(&self) -> Option<String> {
        self.read()
            .auto_config_url
            .or_else(|| self.inner.get_auto_config_url())
    }

    fn get_proxy(&self, scheme: &str) -> Option<String> {
        self.read().proxy.or_else(|| self.inner.get_proxy(scheme))
    }

    fn get_bypass_list(&self) -> Option<String> {
        self.read().bypass_list.or_else(|| self.inner.get_bypass_list())
    }
}
