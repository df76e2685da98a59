//! Project registry: the validated result layers of a workspace.

use crate::error::{BiodivError, Result};
use crate::models::{LayerState, ResultLayer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    layers: Vec<ResultLayer>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; a missing file is an empty project
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            BiodivError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BiodivError::Serialization(format!("Failed to serialize project: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Register a validated layer, replacing any layer with the same name
    pub fn add(&mut self, layer: ResultLayer) -> Result<()> {
        if layer.state != LayerState::Validated {
            return Err(BiodivError::InvalidResultLayer {
                layer: layer.name.clone(),
                reason: format!("only validated layers can be added (state: {})", layer.state),
            });
        }

        match self.layers.iter_mut().find(|l| l.name == layer.name) {
            Some(existing) => {
                tracing::info!("Replacing layer '{}'", layer.name);
                *existing = layer;
            }
            None => self.layers.push(layer),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ResultLayer> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| BiodivError::LayerNotFound { name: name.to_string() })
    }

    pub fn remove(&mut self, name: &str) -> Result<ResultLayer> {
        let index = self
            .layers
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| BiodivError::LayerNotFound { name: name.to_string() })?;
        Ok(self.layers.remove(index))
    }

    pub fn layers(&self) -> &[ResultLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnInfo, LayerSource};
    use tempfile::TempDir;

    fn validated(name: &str, rows: u64) -> ResultLayer {
        let mut layer = ResultLayer::new(name);
        layer.source = Some(LayerSource::Table { schema: "public".into(), table: "obs".into() });
        layer.columns = vec![ColumnInfo::new("id", "int8"), ColumnInfo::new("geom", "geometry")];
        layer.row_count = Some(rows);
        layer.transition(LayerState::Bound).unwrap();
        layer.transition(LayerState::Validated).unwrap();
        layer
    }

    #[test]
    fn test_add_replaces_by_name() {
        let mut project = Project::new();
        project.add(validated("Observations", 3)).unwrap();
        project.add(validated("Observations", 8)).unwrap();

        assert_eq!(project.len(), 1);
        assert_eq!(project.get("Observations").unwrap().row_count, Some(8));
    }

    #[test]
    fn test_unvalidated_layer_rejected() {
        let mut project = Project::new();
        let result = project.add(ResultLayer::new("draft"));
        assert!(matches!(result, Err(BiodivError::InvalidResultLayer { .. })));
        assert!(project.is_empty());
    }

    #[test]
    fn test_remove_unknown_layer() {
        let mut project = Project::new();
        assert!(matches!(project.remove("nope"), Err(BiodivError::LayerNotFound { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.toml");

        let mut project = Project::new();
        project.add(validated("Observations", 3)).unwrap();
        project.add(validated("Species summary", 0)).unwrap();
        project.save(&path).unwrap();

        let loaded = Project::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let layer = loaded.get("Species summary").unwrap();
        assert_eq!(layer.row_count, Some(0));
        assert!(layer.has_geometry());
        assert_eq!(layer.state, LayerState::Validated);
    }
}
