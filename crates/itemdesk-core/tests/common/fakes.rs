//! Recording and failing collaborators for service tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use itemdesk_core::{
    Action, AuditEvent, AuditSink, Authorizer, BackupSink, CoreConfig, HookError, Hooks,
    ItemRecord, MemoryRecordStore, Notifier, RecordId, RecordService, Value,
};

/// Captures everything the service dispatches.
#[derive(Default)]
pub struct Recorder {
    pub audits: Mutex<Vec<AuditEvent>>,
    pub notifications: Mutex<Vec<(Option<Value>, RecordId)>>,
    pub snapshots: Mutex<Vec<RecordId>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn audit_kinds(&self) -> Vec<String> {
        self.audits
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind.to_string())
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

impl AuditSink for Recorder {
    fn record(&self, event: &AuditEvent) -> Result<(), HookError> {
        self.audits.lock().unwrap().push(event.clone());
        Ok(())
    }
}

impl Notifier for Recorder {
    fn notify(&self, settings: Option<&Value>, record: &ItemRecord) -> Result<(), HookError> {
        self.notifications
            .lock()
            .unwrap()
            .push((settings.cloned(), record.id));
        Ok(())
    }
}

impl BackupSink for Recorder {
    fn snapshot(&self, record: &ItemRecord) -> Result<(), HookError> {
        self.snapshots.lock().unwrap().push(record.id);
        Ok(())
    }
}

/// Fails every call.
pub struct Failing;

impl AuditSink for Failing {
    fn record(&self, _event: &AuditEvent) -> Result<(), HookError> {
        Err(HookError::new("audit log offline"))
    }
}

impl Notifier for Failing {
    fn notify(&self, _settings: Option<&Value>, _record: &ItemRecord) -> Result<(), HookError> {
        Err(HookError::new("smtp refused"))
    }
}

impl BackupSink for Failing {
    fn snapshot(&self, _record: &ItemRecord) -> Result<(), HookError> {
        Err(HookError::new("bucket missing"))
    }
}

/// Denies listed (actor, action) pairs and counts every check.
#[derive(Default)]
pub struct DenyList {
    denied: HashSet<(String, Action)>,
    pub checks: Mutex<Vec<(String, Action)>>,
}

#[allow(dead_code)]
impl DenyList {
    pub fn deny(mut self, actor: &str, action: Action) -> Self {
        self.denied.insert((actor.to_string(), action));
        self
    }

    pub fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }
}

impl Authorizer for DenyList {
    fn authorize(&self, actor: &str, action: Action, _record: Option<RecordId>) -> bool {
        self.checks
            .lock()
            .unwrap()
            .push((actor.to_string(), action));
        !self.denied.contains(&(actor.to_string(), action))
    }
}

/// A memory-backed service with recording hooks and backups on.
#[allow(dead_code)]
pub fn recorded_service(config: CoreConfig) -> (RecordService, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let hooks = Hooks::default()
        .with_audit(recorder.clone())
        .with_notifier(recorder.clone())
        .with_backup(recorder.clone());
    let mut config = config;
    config.service.backup_enabled = true;
    let service = RecordService::from_config(Arc::new(MemoryRecordStore::new()), &config, hooks)
        .expect("valid config");
    (service, recorder)
}
