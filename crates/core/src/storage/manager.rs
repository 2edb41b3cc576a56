use log::debug;

use crate::errors::CoreError;
use crate::models::workspace::Workspace;

use super::format;

/// Save/load the workspace to/from snapshot bytes or files.
pub struct StorageManager;

impl StorageManager {
    /// Flow: Workspace → bincode → CLRT frame
    pub fn save_to_bytes(workspace: &Workspace) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(workspace)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize workspace: {e}")))?;
        debug!(
            "serialized workspace: {} portfolios, {} bytes",
            workspace.portfolios.len(),
            payload.len()
        );
        Ok(format::write_snapshot(format::CURRENT_VERSION, &payload))
    }

    /// Flow: CLRT frame → header checks → bincode → Workspace
    pub fn load_from_bytes(data: &[u8]) -> Result<Workspace, CoreError> {
        let (_header, payload) = format::read_snapshot(data)?;
        bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize workspace: {e}")))
    }

    /// Save to a file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(workspace: &Workspace, path: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(workspace)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load from a file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Workspace, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}
