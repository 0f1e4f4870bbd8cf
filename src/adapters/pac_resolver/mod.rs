mod resolver;

pub use resolver::PacProxyResolver;
