use std::collections::HashMap;

use crate::ports::ConfigPort;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Curl-style proxy environment: `<scheme>_proxy`, `all_proxy` and `no_proxy`,
/// each in lower or upper case.
///
/// The environment carries no auto-discovery or auto-config setting.
pub struct EnvConfig {
    lookup: Lookup,
}

impl EnvConfig {
    pub fn new() -> Self {
        Self {
            lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Read from a fixed set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            lookup: Box::new(move |name| vars.get(name).cloned()),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .or_else(|| (self.lookup)(&name.to_ascii_uppercase()))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for EnvConfig {
    fn get_auto_discover(&self) -> bool {
        false
    }

    fn get_auto_config_url(&self) -> Option<String> {
        None
    }

    fn get_proxy(&self, scheme: &str) -> Option<String> {
        self.var(&format!("{}_proxy", scheme.to_ascii_lowercase()))
            .or_else(|| self.var("all_proxy"))
    }

    fn get_bypass_list(&self) -> Option<String> {
        self.var("no_proxy")
    }
}
