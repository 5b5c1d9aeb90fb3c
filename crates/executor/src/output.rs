//! Output materialization: adapter-or-filesystem-enumeration (§4.4 step 6,
//! §9 Open Question 3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use steep_model::Value;

use crate::error::Result;

/// Plugin invoked instead of filesystem enumeration for a registered data
/// type (§9 decision 3: "an output-adapter plugin registered for a
/// dataType always wins").
#[async_trait]
pub trait OutputAdapter: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<Vec<Value>>;
}

/// Adapters keyed by the [`steep_model::DataType`] they handle.
#[derive(Default)]
pub struct OutputAdapterRegistry {
    adapters: HashMap<String, Arc<dyn OutputAdapter>>,
}

impl OutputAdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, data_type: impl Into<String>, adapter: Arc<dyn OutputAdapter>) {
        self.adapters.insert(data_type.into(), adapter);
    }

    #[must_use]
    pub fn get(&self, data_type: &str) -> Option<Arc<dyn OutputAdapter>> {
        self.adapters.get(data_type).cloned()
    }
}

/// Recursively enumerate every regular file under `root`, used when no
/// adapter is registered for the argument's data type.
///
/// A `root` that is itself a regular file (not a directory) resolves to
/// just that one path.
pub async fn enumerate_filesystem(root: &str) -> Result<Vec<Value>> {
    let root_path = std::path::PathBuf::from(root);
    let mut stack = vec![root_path.clone()];
    let mut found = Vec::new();

    while let Some(path) = stack.pop() {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(error) => {
                return Err(crate::error::ExecutorError::ExecutionError {
                    message: format!("enumerating `{}`: {error}", path.display()),
                    last_output: None,
                    exit_code: None,
                });
            }
        };

        if metadata.is_dir() {
            let mut entries = tokio::fs::read_dir(&path).await.map_err(|error| {
                crate::error::ExecutorError::ExecutionError {
                    message: format!("reading dir `{}`: {error}", path.display()),
                    last_output: None,
                    exit_code: None,
                }
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|error| {
                crate::error::ExecutorError::ExecutionError {
                    message: format!("reading dir entry under `{}`: {error}", path.display()),
                    last_output: None,
                    exit_code: None,
                }
            })? {
                stack.push(entry.path());
            }
        } else {
            // §6 "result enumeration ... returning relative file paths":
            // relative to the enumeration root, not the absolute path the
            // walk happened to use. A `root` that is itself the file (no
            // directory nesting to relativize against) falls back to its
            // own file name.
            let relative = path
                .strip_prefix(&root_path)
                .ok()
                .filter(|rel| !rel.as_os_str().is_empty())
                .map(std::path::Path::to_path_buf)
                .unwrap_or_else(|| std::path::PathBuf::from(path.file_name().unwrap_or_default()));
            found.push(Value::Path(relative.to_string_lossy().into_owned()));
        }
    }

    found.sort_by(|a, b| match (a, b) {
        (Value::Path(a), Value::Path(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    });
    Ok(found)
}

/// Resolve one OUTPUT argument's values: adapter if registered for
/// `data_type`, filesystem enumeration otherwise.
pub async fn resolve_output(
    adapters: &OutputAdapterRegistry,
    data_type: &str,
    path: &str,
) -> Result<Vec<Value>> {
    if let Some(adapter) = adapters.get(data_type) {
        adapter.resolve(path).await
    } else {
        enumerate_filesystem(path).await
    }
}
