mod env;
mod overrides;

pub use env::EnvConfig;
pub use overrides::OverrideConfig;
