/// Port for reading proxy settings from the operating system
pub trait ConfigPort: Send + Sync {
    /// Whether WPAD auto-discovery is enabled
    fn get_auto_discover(&self) -> bool;

    /// Explicitly configured PAC script URL, if any
    fn get_auto_config_url(&self) -> Option<String>;

    /// Manual proxy configured for the given URL scheme, if any
    fn get_proxy(&self, scheme: &str) -> Option<String>;

    /// Comma-separated bypass rules, if any
    fn get_bypass_list(&self) -> Option<String>;
}
