//! Availability of the wg and wg-quick executables.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use super::error::{TunnelError, TunnelResult};

/// Makes sure the helper executables can be run.
pub trait ToolingProbe: Send + Sync {
    fn ensure_tools_available(&self) -> TunnelResult<()>;
}

/// Looks the helper executables up on `PATH`. A successful lookup is cached.
#[derive(Debug)]
pub struct PathToolingProbe {
    tools: Vec<String>,
    found: Mutex<Option<Vec<PathBuf>>>,
}

impl PathToolingProbe {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathToolingProbe {
            tools: tools.into_iter().map(Into::into).collect(),
            found: Mutex::new(None),
        }
    }

    /// Resolved paths, once a probe has succeeded.
    pub fn resolved(&self) -> Option<Vec<PathBuf>> {
        self.found.lock().ok().and_then(|found| found.clone())
    }
}

impl ToolingProbe for PathToolingProbe {
    fn ensure_tools_available(&self) -> TunnelResult<()> {
        let mut found = self
            .found
            .lock()
            .map_err(|_| TunnelError::ToolingUnavailable("probe state poisoned".to_string()))?;
        if found.is_some() {
            return Ok(());
        }

        let mut paths = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            match which::which(tool) {
                Ok(path) => {
                    debug!("Found {} at {}", tool, path.display());
                    paths.push(path);
                }
                Err(e) => {
                    warn!("{} not found: {}", tool, e);
                    return Err(TunnelError::ToolingUnavailable(format!("{tool}: {e}")));
                }
            }
        }
        *found = Some(paths);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_finds_shell() {
        let probe = PathToolingProbe::new(["sh"]);
        probe.ensure_tools_available().unwrap();
        assert_eq!(probe.resolved().map(|paths| paths.len()), Some(1));
    }

    #[test]
    fn test_missing_tool() {
        let probe = PathToolingProbe::new(["sh", "definitely-not-a-real-tool-4f2a"]);
        let err = probe.ensure_tools_available().unwrap_err();
        assert!(matches!(err, TunnelError::ToolingUnavailable(_)));
        assert!(probe.resolved().is_none());
    }
}
