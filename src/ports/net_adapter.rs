use crate::domain::NetAdapter;

/// Port for enumerating connected network adapters
pub trait NetAdapterPort: Send + Sync {
    /// Visit every connected adapter; returning `false` from `visit` stops the enumeration
    fn for_each_adapter(&self, visit: &mut dyn FnMut(&NetAdapter) -> bool);
}
