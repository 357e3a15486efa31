use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fluffer_core::NotificationSurface;
use fluffer_domain::{
    ChannelId, FlufferError, GroupInfo, MessageId, MessagePayload, ReactionSet,
    Result as DomainResult, ScheduledEventPayload, UserId,
};

pub const BOT_ID: &str = "bot";

#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub channel: ChannelId,
    pub payload: MessagePayload,
    /// emoji -> users, in insertion order.
    pub reactions: BTreeMap<String, Vec<UserId>>,
}

#[derive(Default)]
struct SurfaceState {
    groups: BTreeMap<String, GroupInfo>,
    channels: BTreeMap<String, ChannelId>,
    display_names: BTreeMap<UserId, String>,
    messages: BTreeMap<MessageId, PostedMessage>,
    pinned: BTreeSet<MessageId>,
    scheduled: BTreeMap<String, ScheduledEventPayload>,
    next_id: u64,
    created_messages: usize,
    deleted_messages: Vec<MessageId>,
    removed_reactions: Vec<(MessageId, String, UserId)>,
    fail_deletes: bool,
    fail_edits: bool,
    no_scheduled_events: bool,
}

impl SurfaceState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// In-memory chat surface.
///
/// Channel `general` exists by default. Deleted messages answer edits with
/// `NotFound`.
#[derive(Clone)]
pub struct MockSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl Default for MockSurface {
    fn default() -> Self {
        let mock = Self { state: Arc::new(Mutex::new(SurfaceState::default())) };
        mock.add_channel("general", "chan-general");
        mock
    }
}

impl MockSurface {
    pub fn with_group(self, name: &str, members: &[&str], color: Option<u32>) -> Self {
        self.set_group(name, members, color);
        self
    }

    pub fn set_group(&self, name: &str, members: &[&str], color: Option<u32>) {
        let group = GroupInfo {
            name: name.to_string(),
            members: members.iter().map(|m| (*m).to_string()).collect(),
            color,
        };
        self.state.lock().unwrap().groups.insert(name.to_lowercase(), group);
    }

    pub fn add_channel(&self, name: &str, id: &str) {
        self.state.lock().unwrap().channels.insert(name.to_lowercase(), id.to_string());
    }

    pub fn set_display_name(&self, user: &str, name: &str) {
        self.state.lock().unwrap().display_names.insert(user.to_string(), name.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    pub fn fail_edits(&self, fail: bool) {
        self.state.lock().unwrap().fail_edits = fail;
    }

    pub fn disable_scheduled_events(&self) {
        self.state.lock().unwrap().no_scheduled_events = true;
    }

    /// A user reacted while nobody was listening.
    pub fn react(&self, message_id: &str, emoji: &str, user: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.messages.get_mut(message_id) {
            message.reactions.entry(emoji.to_string()).or_default().push(user.to_string());
        }
    }

    /// Someone removed the message by hand.
    pub fn delete_externally(&self, message_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.messages.remove(message_id);
        state.pinned.remove(message_id);
    }

    pub fn message(&self, message_id: &str) -> Option<PostedMessage> {
        self.state.lock().unwrap().messages.get(message_id).cloned()
    }

    pub fn live_messages(&self) -> Vec<(MessageId, PostedMessage)> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|(id, message)| (id.clone(), message.clone()))
            .collect()
    }

    pub fn is_pinned(&self, message_id: &str) -> bool {
        self.state.lock().unwrap().pinned.contains(message_id)
    }

    pub fn created_messages(&self) -> usize {
        self.state.lock().unwrap().created_messages
    }

    pub fn deleted_messages(&self) -> Vec<MessageId> {
        self.state.lock().unwrap().deleted_messages.clone()
    }

    pub fn removed_reactions(&self) -> Vec<(MessageId, String, UserId)> {
        self.state.lock().unwrap().removed_reactions.clone()
    }

    pub fn scheduled_events(&self) -> BTreeMap<String, ScheduledEventPayload> {
        self.state.lock().unwrap().scheduled.clone()
    }
}

#[async_trait]
impl NotificationSurface for MockSurface {
    async fn resolve_group(&self, name: &str) -> DomainResult<Option<GroupInfo>> {
        Ok(self.state.lock().unwrap().groups.get(&name.to_lowercase()).cloned())
    }

    async fn resolve_display_name(&self, user: &str) -> DomainResult<String> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .display_names
            .get(user)
            .cloned()
            .unwrap_or_else(|| user.to_string()))
    }

    async fn resolve_channel(&self, name: &str) -> DomainResult<Option<ChannelId>> {
        Ok(self.state.lock().unwrap().channels.get(&name.to_lowercase()).cloned())
    }

    async fn current_user_id(&self) -> DomainResult<UserId> {
        Ok(BOT_ID.to_string())
    }

    async fn create_message(
        &self,
        channel: &str,
        payload: &MessagePayload,
    ) -> DomainResult<MessageId> {
        let mut state = self.state.lock().unwrap();
        let id = state.next("msg");
        state.created_messages += 1;
        state.messages.insert(
            id.clone(),
            PostedMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
                reactions: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    async fn edit_message(
        &self,
        _channel: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_edits {
            return Err(FlufferError::Network("edit failed".into()));
        }
        let message = state
            .messages
            .get_mut(message_id)
            .ok_or_else(|| FlufferError::NotFound(format!("message {message_id}")))?;
        message.payload = payload.clone();
        Ok(())
    }

    async fn delete_message(&self, _channel: &str, message_id: &str) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(FlufferError::Network("delete failed".into()));
        }
        state.messages.remove(message_id);
        state.deleted_messages.push(message_id.to_string());
        Ok(())
    }

    async fn pin_message(&self, _channel: &str, message_id: &str) -> DomainResult<()> {
        self.state.lock().unwrap().pinned.insert(message_id.to_string());
        Ok(())
    }

    async fn unpin_message(&self, _channel: &str, message_id: &str) -> DomainResult<()> {
        self.state.lock().unwrap().pinned.remove(message_id);
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: &str,
        message_id: &str,
        emoji: &str,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(message_id)
            .ok_or_else(|| FlufferError::NotFound(format!("message {message_id}")))?;
        let users = message.reactions.entry(emoji.to_string()).or_default();
        if !users.iter().any(|u| u == BOT_ID) {
            users.push(BOT_ID.to_string());
        }
        Ok(())
    }

    async fn enumerate_reactions(
        &self,
        _channel: &str,
        message_id: &str,
    ) -> DomainResult<Vec<ReactionSet>> {
        let state = self.state.lock().unwrap();
        let message = state
            .messages
            .get(message_id)
            .ok_or_else(|| FlufferError::NotFound(format!("message {message_id}")))?;
        Ok(message
            .reactions
            .iter()
            .map(|(emoji, users)| ReactionSet { emoji: emoji.clone(), users: users.clone() })
            .collect())
    }

    async fn remove_user_reaction(
        &self,
        _channel: &str,
        message_id: &str,
        emoji: &str,
        user: &str,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(users) =
            state.messages.get_mut(message_id).and_then(|m| m.reactions.get_mut(emoji))
        {
            users.retain(|u| u != user);
        }
        state.removed_reactions.push((message_id.to_string(), emoji.to_string(), user.to_string()));
        Ok(())
    }

    fn supports_scheduled_events(&self) -> bool {
        !self.state.lock().unwrap().no_scheduled_events
    }

    async fn create_scheduled_event(&self, payload: &ScheduledEventPayload) -> DomainResult<String> {
        let mut state = self.state.lock().unwrap();
        let id = state.next("sched");
        state.scheduled.insert(id.clone(), payload.clone());
        Ok(id)
    }

    async fn edit_scheduled_event(
        &self,
        id: &str,
        payload: &ScheduledEventPayload,
    ) -> DomainResult<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .scheduled
            .get_mut(id)
            .ok_or_else(|| FlufferError::NotFound(format!("scheduled event {id}")))?;
        *existing = payload.clone();
        Ok(())
    }

    async fn delete_scheduled_event(&self, id: &str) -> DomainResult<()> {
        self.state.lock().unwrap().scheduled.remove(id);
        Ok(())
    }
}
