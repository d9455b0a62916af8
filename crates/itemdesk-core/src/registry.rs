use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::record::TemplateId;
use crate::schema::{ResolvedSchema, Template};

/// Error from the template registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Template already registered: {0}")]
    AlreadyRegistered(TemplateId),

    #[error("Duplicate field name '{field}' in template '{template}'")]
    DuplicateField { template: TemplateId, field: String },

    #[error("Template '{template}' inherits from unknown template '{parent}'")]
    UnknownParent {
        template: TemplateId,
        parent: TemplateId,
    },
}

/// Error from schema resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("Template inheritance cycle at: {0}")]
    InheritanceCycle(TemplateId),
}

/// Supplier of template definitions. Template data is owned by
/// configuration, not by the record core.
pub trait TemplateSource: Send + Sync {
    fn template(&self, id: &str) -> Option<Template>;
}

/// In-memory registry of templates loaded from configuration.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list in any order; parents are registered
    /// before the templates that inherit from them.
    pub fn from_templates(templates: Vec<Template>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        let mut pending = templates;
        loop {
            let before = pending.len();
            let mut deferred = Vec::new();
            for template in pending {
                let ready = match &template.inherits {
                    Some(parent) => registry.templates.contains_key(parent),
                    None => true,
                };
                if ready {
                    registry.register(template)?;
                } else {
                    deferred.push(template);
                }
            }
            if deferred.is_empty() {
                return Ok(registry);
            }
            if deferred.len() == before {
                // No progress: the first leftover names a parent that never arrives.
                let t = &deferred[0];
                return Err(RegistryError::UnknownParent {
                    template: t.id.clone(),
                    parent: t.inherits.clone().unwrap_or_default(),
                });
            }
            pending = deferred;
        }
    }

    /// Register a new template. The parent, if any, must already be registered.
    pub fn register(&mut self, template: Template) -> Result<(), RegistryError> {
        if self.templates.contains_key(&template.id) {
            return Err(RegistryError::AlreadyRegistered(template.id.clone()));
        }
        if let Some(parent) = &template.inherits {
            if !self.templates.contains_key(parent) {
                return Err(RegistryError::UnknownParent {
                    template: template.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        let mut seen = HashSet::new();
        for field in &template.fields {
            if !seen.insert(&field.name) {
                return Err(RegistryError::DuplicateField {
                    template: template.id.clone(),
                    field: field.name.clone(),
                });
            }
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    pub fn list(&self) -> Vec<&Template> {
        self.templates.values().collect()
    }
}

impl TemplateSource for TemplateRegistry {
    fn template(&self, id: &str) -> Option<Template> {
        self.templates.get(id).cloned()
    }
}

/// Resolves a record's allowed custom-field set from its template reference.
///
/// Results are memoized per template id for the lifetime of the resolver.
pub struct SchemaResolver {
    source: Arc<dyn TemplateSource>,
    cache: Mutex<HashMap<TemplateId, Arc<ResolvedSchema>>>,
}

impl SchemaResolver {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the schema for `template_id`; `None` resolves to the empty set.
    pub fn resolve(&self, template_id: Option<&str>) -> Result<Arc<ResolvedSchema>, ResolveError> {
        let Some(id) = template_id else {
            return Ok(Arc::new(ResolvedSchema::empty()));
        };

        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Arc::clone(hit));
        }

        let resolved = Arc::new(self.build(id)?);
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&resolved));
        tracing::debug!(template = id, fields = resolved.fields.len(), "resolved template");
        Ok(resolved)
    }

    /// Drop memoized schemas, e.g. after the template source was reloaded.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Walk the inheritance chain, root first, so child definitions override.
    fn build(&self, id: &str) -> Result<ResolvedSchema, ResolveError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id.to_string());
        while let Some(current) = next {
            if !seen.insert(current.clone()) {
                return Err(ResolveError::InheritanceCycle(current));
            }
            let template = self
                .source
                .template(&current)
                .ok_or_else(|| ResolveError::TemplateNotFound(current.clone()))?;
            next = template.inherits.clone();
            chain.push(template);
        }

        let mut schema = ResolvedSchema {
            template_id: Some(id.to_string()),
            ..Default::default()
        };
        for template in chain.into_iter().rev() {
            for field in template.fields {
                schema.fields.insert(field.name.clone(), field);
            }
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn field(name: &str, field_type: FieldType, required: bool) -> FieldDef {
        FieldDef {
            name: name.into(),
            field_type,
            required,
            description: None,
        }
    }

    fn base_template() -> Template {
        Template {
            id: "tracked".into(),
            name: "Tracked".into(),
            fields: vec![
                field("risk", FieldType::String, false),
                field("owner_team", FieldType::String, true),
            ],
            inherits: None,
        }
    }

    fn child_template() -> Template {
        Template {
            id: "hardware".into(),
            name: "Hardware".into(),
            fields: vec![
                field("units", FieldType::Int, true),
                field("risk", FieldType::Int, false),
            ],
            inherits: Some("tracked".into()),
        }
    }

    #[test]
    fn register_duplicate_fails() {
        let mut reg = TemplateRegistry::new();
        reg.register(base_template()).unwrap();
        let err = reg.register(base_template()).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[test]
    fn duplicate_field_in_template() {
        let mut reg = TemplateRegistry::new();
        let template = Template {
            id: "bad".into(),
            name: "Bad".into(),
            fields: vec![
                field("risk", FieldType::String, false),
                field("risk", FieldType::Int, false),
            ],
            inherits: None,
        };
        let err = reg.register(template).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateField { .. }));
    }

    #[test]
    fn from_templates_orders_parents_first() {
        let reg = TemplateRegistry::from_templates(vec![child_template(), base_template()]).unwrap();
        assert_eq!(reg.list().len(), 2);
        assert!(reg.get("hardware").is_some());
    }

    #[test]
    fn from_templates_reports_missing_parent() {
        let err = TemplateRegistry::from_templates(vec![child_template()]).unwrap_err();
        match err {
            RegistryError::UnknownParent { template, parent } => {
                assert_eq!(template, "hardware");
                assert_eq!(parent, "tracked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_none_is_empty() {
        let resolver = SchemaResolver::new(Arc::new(TemplateRegistry::new()));
        let schema = resolver.resolve(None).unwrap();
        assert!(schema.fields.is_empty());
        assert!(schema.template_id.is_none());
    }

    #[test]
    fn resolve_unknown_template() {
        let resolver = SchemaResolver::new(Arc::new(TemplateRegistry::new()));
        let err = resolver.resolve(Some("nope")).unwrap_err();
        assert_eq!(err, ResolveError::TemplateNotFound("nope".into()));
    }

    #[test]
    fn resolve_merges_inherited_fields_child_wins() {
        let reg = TemplateRegistry::from_templates(vec![base_template(), child_template()]).unwrap();
        let resolver = SchemaResolver::new(Arc::new(reg));
        let schema = resolver.resolve(Some("hardware")).unwrap();
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(schema.field("risk").unwrap().field_type, FieldType::Int);
        let mut required: Vec<_> = schema.required_keys().collect();
        required.sort();
        assert_eq!(required, vec!["owner_team", "units"]);
    }

    struct CountingSource {
        inner: TemplateRegistry,
        lookups: AtomicUsize,
    }

    impl TemplateSource for CountingSource {
        fn template(&self, id: &str) -> Option<Template> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.template(id)
        }
    }

    #[test]
    fn resolve_is_memoized_until_cleared() {
        let mut inner = TemplateRegistry::new();
        inner.register(base_template()).unwrap();
        let source = Arc::new(CountingSource {
            inner,
            lookups: AtomicUsize::new(0),
        });
        let resolver = SchemaResolver::new(source.clone());
        resolver.resolve(Some("tracked")).unwrap();
        resolver.resolve(Some("tracked")).unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);

        resolver.clear();
        resolver.resolve(Some("tracked")).unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
    }

    struct LoopSource;

    impl TemplateSource for LoopSource {
        fn template(&self, id: &str) -> Option<Template> {
            let parent = if id == "a" { "b" } else { "a" };
            Some(Template {
                id: id.into(),
                name: id.into(),
                fields: vec![],
                inherits: Some(parent.into()),
            })
        }
    }

    #[test]
    fn resolve_detects_inheritance_cycle() {
        let resolver = SchemaResolver::new(Arc::new(LoopSource));
        let err = resolver.resolve(Some("a")).unwrap_err();
        assert!(matches!(err, ResolveError::InheritanceCycle(_)));
    }
}
