//! JavaScript sandbox running `FindProxyForURL`.

#[cfg(feature = "execute")]
mod engine;

#[cfg(feature = "execute")]
pub use engine::find_proxy_for_url;

use url::Url;

use crate::domain::{ProxyError, Result};

#[cfg(not(feature = "execute"))]
pub fn find_proxy_for_url(_script: &str, _url: &Url) -> Result<String> {
    Err(ProxyError::Unsupported(
        "built without the execute feature".into(),
    ))
}

/// One script evaluation with its outcome kept for later inspection.
#[derive(Debug, Default)]
pub struct ScriptExecution {
    list: Option<String>,
    error: Option<ProxyError>,
}

impl ScriptExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `script` for `url`. Returns false when evaluation failed.
    pub fn get_proxies_for_url(&mut self, script: &str, url: &str) -> bool {
        let outcome = Url::parse(url)
            .map_err(ProxyError::from)
            .and_then(|url| find_proxy_for_url(script, &url));
        match outcome {
            Ok(list) => {
                self.list = Some(list);
                self.error = None;
                true
            }
            Err(e) => {
                self.list = None;
                self.error = Some(e);
                false
            }
        }
    }

    /// Raw `FindProxyForURL` result of the last successful run.
    pub fn list(&self) -> Option<&str> {
        self.list.as_deref()
    }

    /// Error code of the last run, 0 on success.
    pub fn error(&self) -> i32 {
        self.error.as_ref().map_or(0, ProxyError::code)
    }

    pub fn last_error(&self) -> Option<&ProxyError> {
        self.error.as_ref()
    }
}

#[cfg(all(test, feature = "execute"))]
mod tests {
    use super::*;

    #[test]
    fn test_execution_keeps_list_and_error() {
        let mut execution = ScriptExecution::new();
        assert!(execution.get_proxies_for_url(
            "function FindProxyForURL(u, h) { return 'PROXY p:1'; }",
            "http://a.example/"
        ));
        assert_eq!(execution.list(), Some("PROXY p:1"));
        assert_eq!(execution.error(), 0);

        assert!(!execution.get_proxies_for_url("garbage(", "http://a.example/"));
        assert_eq!(execution.list(), None);
        assert_eq!(execution.error(), ProxyError::ScriptFailed(String::new()).code());
    }

    #[test]
    fn test_bad_url_reports_invalid_uri() {
        let mut execution = ScriptExecution::new();
        assert!(!execution.get_proxies_for_url("", "not a url"));
        assert!(matches!(execution.last_error(), Some(ProxyError::InvalidUri(_))));
    }
}
