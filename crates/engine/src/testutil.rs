//! In-memory collaborator fakes shared by the engine unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use herald_common::types::{ChatMessage, NotificationPreference, TaskSummary};
use herald_platform::{
    ChannelInfo, ChatClient, EventFilter, IdentityMap, ItemFilter, PlatformError, PlatformResult,
    PreferenceStore, WorkItemClient,
};

#[derive(Default)]
struct ChatState {
    groups: HashMap<String, String>,
    channels: Vec<ChannelInfo>,
    next_id: u64,
    creations: usize,
    fail_create: HashSet<String>,
    refuse_direct: HashSet<String>,
    channel_sends: Vec<(String, ChatMessage)>,
    direct_sends: Vec<(String, ChatMessage)>,
}

/// Scriptable chat platform: seeded groups/channels, per-name creation
/// failures, per-identity DM refusal, and recorded sends.
#[derive(Default)]
pub struct FakeChat {
    state: Mutex<ChatState>,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_group(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("group-{}", state.next_id);
        state.groups.insert(name.to_string(), id.clone());
        id
    }

    pub fn seed_channel(&self, group_id: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("chan-{}", state.next_id);
        state.channels.push(ChannelInfo {
            id: id.clone(),
            name: name.to_string(),
            parent_id: Some(group_id.to_string()),
            is_category: false,
        });
        id
    }

    pub fn fail_channel_creation(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_create
            .insert(name.to_string());
    }

    pub fn refuse_direct(&self, identity: &str) {
        self.state
            .lock()
            .unwrap()
            .refuse_direct
            .insert(identity.to_string());
    }

    pub fn delete_channel_named(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .channels
            .retain(|c| c.name != name);
    }

    pub fn channel_exists(&self, id: &str) -> bool {
        self.state.lock().unwrap().channels.iter().any(|c| c.id == id)
    }

    /// Number of `create_channel` calls that succeeded.
    pub fn created_channels(&self) -> usize {
        self.state.lock().unwrap().creations
    }

    pub fn channel_sends(&self) -> Vec<(String, ChatMessage)> {
        self.state.lock().unwrap().channel_sends.clone()
    }

    pub fn direct_sends(&self) -> Vec<(String, ChatMessage)> {
        self.state.lock().unwrap().direct_sends.clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send_to_channel(
        &self,
        destination_id: &str,
        message: &ChatMessage,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.channels.iter().any(|c| c.id == destination_id) {
            return Err(PlatformError::NotFound(destination_id.to_string()));
        }
        state
            .channel_sends
            .push((destination_id.to_string(), message.clone()));
        Ok(())
    }

    async fn send_direct(&self, identity: &str, message: &ChatMessage) -> PlatformResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_direct.contains(identity) {
            return Err(PlatformError::Refused(
                "recipient blocks direct messages".to_string(),
            ));
        }
        state
            .direct_sends
            .push((identity.to_string(), message.clone()));
        Ok(())
    }

    async fn create_channel(
        &self,
        group_id: &str,
        name: &str,
        _description: &str,
    ) -> PlatformResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(name) {
            return Err(PlatformError::Forbidden(format!(
                "missing manage-channels permission for {}",
                name
            )));
        }
        state.next_id += 1;
        state.creations += 1;
        let id = format!("chan-{}", state.next_id);
        state.channels.push(ChannelInfo {
            id: id.clone(),
            name: name.to_string(),
            parent_id: Some(group_id.to_string()),
            is_category: false,
        });
        Ok(id)
    }

    async fn list_channels(&self, group_id: &str) -> PlatformResult<Vec<ChannelInfo>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(group_id))
            .cloned()
            .collect())
    }

    async fn find_group(&self, name: &str) -> PlatformResult<Option<String>> {
        Ok(self.state.lock().unwrap().groups.get(name).cloned())
    }

    async fn create_group(&self, name: &str) -> PlatformResult<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("group-{}", state.next_id);
        state.groups.insert(name.to_string(), id.clone());
        Ok(id)
    }
}

/// In-memory work-item service with seeded tasks.
#[derive(Default)]
pub struct FakeItems {
    tasks: Mutex<HashMap<String, TaskSummary>>,
}

impl FakeItems {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, gid: &str, name: &str) {
        let mut task = TaskSummary::degraded(gid);
        task.name = Some(name.to_string());
        self.tasks.lock().unwrap().insert(gid.to_string(), task);
    }
}

#[async_trait]
impl WorkItemClient for FakeItems {
    async fn get_item(&self, gid: &str) -> PlatformResult<TaskSummary> {
        self.tasks
            .lock()
            .unwrap()
            .get(gid)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(gid.to_string()))
    }

    async fn list_items(&self, _: Option<&ItemFilter>) -> PlatformResult<Vec<TaskSummary>> {
        Ok(self.tasks.lock().unwrap().values().cloned().collect())
    }

    async fn register_webhook(&self, _: &str, _: &[EventFilter]) -> PlatformResult<String> {
        Ok("wh-1".to_string())
    }
}

/// Fixed external-id → chat-identity table.
#[derive(Default)]
pub struct FakeIdentities {
    mappings: HashMap<String, String>,
}

impl FakeIdentities {
    pub fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            mappings: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl IdentityMap for FakeIdentities {
    async fn lookup_local_identity(&self, external_id: &str) -> PlatformResult<Option<String>> {
        Ok(self.mappings.get(external_id).cloned())
    }
}

/// In-memory preference rows; absent entries exercise the defaults path.
#[derive(Default)]
pub struct FakePreferences {
    rows: Mutex<HashMap<String, NotificationPreference>>,
}

impl FakePreferences {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, prefs: NotificationPreference) {
        self.rows
            .lock()
            .unwrap()
            .insert(prefs.identity.clone(), prefs);
    }
}

#[async_trait]
impl PreferenceStore for FakePreferences {
    async fn get(&self, identity: &str) -> PlatformResult<Option<NotificationPreference>> {
        Ok(self.rows.lock().unwrap().get(identity).cloned())
    }

    async fn set(&self, identity: &str, prefs: &NotificationPreference) -> PlatformResult<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(identity.to_string(), prefs.clone());
        Ok(())
    }
}
