//! Shared handles of a running hub

use chrono::Utc;
use std::sync::Arc;

use super::access::AccessCoordinator;
use super::executor::{CommandExecutor, CommandOutcome, OperatorCommand};
use crate::codec::{self, TemplateSummary};
use crate::control::NodeMessenger;
use crate::resolver::ResolutionEngine;
use crate::storage::{AssetEntry, AssetStore, StorageError};
use crate::topology::TopologyView;

/// Everything the control plane and the operator API share
#[derive(Clone)]
pub struct HubContext {
    pub coordinator: Arc<AccessCoordinator>,
    pub resolver: Arc<ResolutionEngine>,
    pub messenger: NodeMessenger,
    pub executor: CommandExecutor,
}

/// Result of storing an uploaded asset
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadOutcome {
    pub name: String,
    /// Name the previous version was moved to, when a backup was requested
    pub backup: Option<String>,
}

/// Uploaded asset with its description
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileView {
    #[serde(flatten)]
    pub entry: AssetEntry,
    pub description: String,
}

impl HubContext {
    pub fn new(
        coordinator: Arc<AccessCoordinator>,
        resolver: Arc<ResolutionEngine>,
        messenger: NodeMessenger,
        executor: CommandExecutor,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            messenger,
            executor,
        }
    }

    pub fn assets(&self) -> &AssetStore {
        self.executor.assets()
    }

    /// Operator view of the current topology
    pub async fn view(&self) -> TopologyView {
        self.coordinator
            .with_exclusive_access(|t| TopologyView::from(&*t))
            .await
    }

    /// Execute an operator command and send the node commands it produced
    pub async fn execute(&self, command: OperatorCommand) -> CommandOutcome {
        let executor = &self.executor;
        let outcome = self
            .coordinator
            .with_exclusive_access(|t| executor.execute(t, &command, Utc::now()))
            .await;
        self.messenger.dispatch_all(outcome.dispatches.clone());
        outcome
    }

    /// Template text of the current topology
    pub async fn export_template(&self) -> String {
        self.coordinator
            .with_exclusive_access(|t| codec::backup(t))
            .await
    }

    /// Replace the topology with one restored from `text`
    pub async fn import_template(&self, label: &str, text: &str) -> TemplateSummary {
        let restored = codec::restore(label, text, self.assets());
        let summary = TemplateSummary::of(&restored);
        tracing::info!(
            template = %label,
            nodes = summary.nodes,
            servers = summary.servers,
            domains = summary.domains,
            assignments = summary.assignments,
            "Template restored"
        );
        self.coordinator.replace_topology(restored).await;
        summary
    }

    /// Store an uploaded asset.
    ///
    /// With `backup`, an existing version is first moved aside and inherits
    /// the current description. The description of `name` is replaced when a
    /// non-empty one is given or a backup was made.
    pub async fn upload_file(
        &self,
        name: &str,
        contents: &[u8],
        description: Option<&str>,
        backup: bool,
    ) -> Result<UploadOutcome, StorageError> {
        let assets = self.assets();
        let store = self.executor.descriptions();
        let description = description.unwrap_or_default();

        self.coordinator
            .with_exclusive_access(|t| -> Result<UploadOutcome, StorageError> {
                let backup = if backup {
                    assets.back_up(name, Utc::now())?
                } else {
                    None
                };
                assets.write(name, contents)?;

                let mut changed = !description.is_empty();
                if let Some(backup) = &backup {
                    let previous = t.descriptions.get(name).cloned().unwrap_or_default();
                    t.descriptions.insert(backup.clone(), previous);
                    changed = true;
                }
                if changed {
                    t.descriptions.insert(name.to_string(), description.to_string());
                    if let Err(e) = store.save(&t.descriptions) {
                        tracing::warn!(error = %e, "Failed to persist descriptions");
                    }
                }

                tracing::info!(file = %name, size = contents.len(), backup = ?backup, "Asset uploaded");
                Ok(UploadOutcome {
                    name: name.to_string(),
                    backup,
                })
            })
            .await
    }

    /// Contents of asset `name`, or `None` if it does not exist
    pub fn download_file(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.assets().read(name)
    }

    /// Uploaded assets, newest first, with descriptions
    pub async fn files(&self) -> Result<Vec<FileView>, StorageError> {
        let entries = self.assets().list()?;
        let descriptions = self
            .coordinator
            .with_exclusive_access(|t| t.descriptions.clone())
            .await;
        Ok(entries
            .into_iter()
            .map(|entry| FileView {
                description: descriptions.get(&entry.name).cloned().unwrap_or_default(),
                entry,
            })
            .collect())
    }
}
