//! Sample records inserted into an empty store at start-up

use itemdesk_core::{ItemDraft, ItemRecord, OperationContext, RecordService, Result};

fn samples() -> Vec<ItemDraft> {
    vec![
        ItemDraft {
            description: Some("This is a sample item with detailed information".into()),
            category: Some("work".into()),
            priority: Some("high".into()),
            status: Some("active".into()),
            created_by: Some("system".into()),
            ..ItemDraft::named("Sample Detail Item 1")
        },
        ItemDraft {
            description: Some("Another sample item for testing".into()),
            category: Some("personal".into()),
            priority: Some("medium".into()),
            status: Some("pending".into()),
            created_by: Some("system".into()),
            ..ItemDraft::named("Sample Detail Item 2")
        },
    ]
}

/// Create the sample records unless the store already holds records.
pub fn seed_samples(service: &RecordService) -> Result<Vec<ItemRecord>> {
    let ctx = OperationContext::system();
    if !service.list(&ctx)?.is_empty() {
        tracing::debug!("store not empty, skipping samples");
        return Ok(Vec::new());
    }
    let created = samples()
        .into_iter()
        .map(|draft| service.create(&ctx, draft))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!("Seeded {} sample records", created.len());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemdesk_core::{Category, MemoryRecordStore, Status, TemplateRegistry};
    use std::sync::Arc;

    #[test]
    fn test_seed_once() {
        let service = RecordService::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(TemplateRegistry::new()),
        );
        let created = seed_samples(&service).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].fields.category, Some(Category::Work));
        assert_eq!(created[1].fields.status, Status::Pending);
        assert_eq!(created[1].fields.created_by.as_deref(), Some("system"));

        assert!(seed_samples(&service).unwrap().is_empty());
        assert_eq!(service.list(&OperationContext::system()).unwrap().len(), 2);
    }
}
