//! Template catalog interface.
//!
//! The catalog is an external collaborator: the engine only needs lookup
//! by id. [`InMemoryCatalog`] ships for embedding and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use swapreel_models::Template;

use crate::error::{EngineError, EngineResult};

/// Lookup of immutable template descriptors by id.
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    /// Fetch the template with the given id.
    ///
    /// Fails with [`EngineError::TemplateNotFound`] for unknown ids; that
    /// failure is terminal for a submission.
    async fn get(&self, template_id: &str) -> EngineResult<Arc<Template>>;
}

/// A catalog backed by a map built at startup.
#[derive(Default)]
pub struct InMemoryCatalog {
    templates: HashMap<String, Arc<Template>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, replacing any previous entry with the same id.
    pub fn insert(&mut self, template: Template) {
        self.templates
            .insert(template.id.clone(), Arc::new(template));
    }

    /// Build a catalog from a JSON array of template descriptors.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let templates: Vec<Template> = serde_json::from_str(json)
            .map_err(|e| EngineError::pipeline(format!("invalid template metadata: {}", e)))?;

        let mut catalog = Self::new();
        for template in templates {
            catalog.insert(template);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[async_trait]
impl TemplateCatalog for InMemoryCatalog {
    async fn get(&self, template_id: &str) -> EngineResult<Arc<Template>> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| EngineError::template_not_found(template_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapreel_models::FacePlacement;

    fn template(id: &str) -> Template {
        Template {
            id: id.to_string(),
            name: "Test".to_string(),
            video_path: "/videos/test.mp4".into(),
            audio_path: None,
            fps: 30.0,
            total_frames: 300,
            placements: vec![FacePlacement::full_range(100, 100, 200, 200)],
        }
    }

    #[tokio::test]
    async fn lookup_known_and_unknown() {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert(template("t1"));

        assert_eq!(catalog.get("t1").await.unwrap().id, "t1");
        assert!(matches!(
            catalog.get("nope").await.unwrap_err(),
            EngineError::TemplateNotFound(_)
        ));
    }

    #[tokio::test]
    async fn builds_from_json() {
        let json = serde_json::to_string(&vec![template("t1"), template("t2")]).unwrap();
        let catalog = InMemoryCatalog::from_json_str(&json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("t2").await.is_ok());
    }
}
