// Detection source abstraction and the environment-variable implementation

use crate::core::proxy::types::{Detection, DetectionError, DetectionSourceKind};

/// External collaborator polled by the detection monitor
///
/// Returning an error signals a transient failure; the monitor retries with
/// backoff. `Ok(Detection::none())` means "no proxy configured", which is a
/// successful check.
#[async_trait::async_trait]
pub trait DetectionSource: Send + Sync {
    async fn detect(&self) -> Result<Detection, DetectionError>;
}

/// Variables consulted in priority order
pub const PROXY_ENV_VARS: &[&str] = &[
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// Reads the conventional proxy variables from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvironmentDetector {
    variables: Vec<String>,
}

impl EnvironmentDetector {
    pub fn new() -> Self {
        Self {
            variables: PROXY_ENV_VARS.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Use a custom variable list (first non-empty wins)
    pub fn with_variables(variables: Vec<String>) -> Self {
        Self { variables }
    }

    fn lookup(&self) -> Result<Option<String>, DetectionError> {
        let variables: Vec<&str> = if self.variables.is_empty() {
            PROXY_ENV_VARS.to_vec()
        } else {
            self.variables.iter().map(String::as_str).collect()
        };

        for name in variables {
            match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => return Ok(Some(value.trim().to_string())),
                Ok(_) | Err(std::env::VarError::NotPresent) => continue,
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(DetectionError::Failed(format!("{} is not valid unicode", name)));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl DetectionSource for EnvironmentDetector {
    async fn detect(&self) -> Result<Detection, DetectionError> {
        Ok(match self.lookup()? {
            Some(url) => Detection::found(url, DetectionSourceKind::Environment),
            None => Detection::none(),
        })
    }
}
