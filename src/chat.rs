// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Rentmarket Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Chat engine.
//!
//! Manages rooms, messages, and user chat profiles. Every outgoing message
//! is routed through [`crate::filter`] at send time; its safety score fixes
//! the message's moderation status once, synchronously:
//!
//! ```text
//! score ≥ 70        -> Approved
//! 50 ≤ score < 70   -> Flagged
//! score < 50        -> Blocked
//! ```
//!
//! A report may later force a message to `Flagged` (one-way; a `Blocked`
//! message never improves). Room safety state follows the most recent
//! message's score, with `Blocked` sticky.
//!
//! # Thread Safety
//!
//! Rooms live in a [`DashMap`] and each room guards its interior state with
//! a [`parking_lot::Mutex`], so sends into different rooms proceed in
//! parallel while appends within one room are serialized. Room creation per
//! participant pair goes through the pair index's entry API, which keeps the
//! "one room per unordered pair" invariant under concurrent first sends.

use crate::base::{MessageId, RoomId, UserId};
use crate::error::MarketError;
use crate::filter::{self, FilterOutcome};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sender id used for synthesized safety-alert notices.
pub const SYSTEM_USER: UserId = UserId(0);

/// Classification derived from a message's safety score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Flagged,
    Blocked,
}

impl ModerationStatus {
    /// Threshold mapping; see the module docs for the exact boundaries.
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            ModerationStatus::Approved
        } else if score >= 50 {
            ModerationStatus::Flagged
        } else {
            ModerationStatus::Blocked
        }
    }
}

/// Room-level safety state, derived from message history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomSafetyStatus {
    Safe,
    Warning,
    Blocked,
}

impl RoomSafetyStatus {
    fn from_score(score: u8) -> Self {
        if score >= 70 {
            RoomSafetyStatus::Safe
        } else if score >= 50 {
            RoomSafetyStatus::Warning
        } else {
            RoomSafetyStatus::Blocked
        }
    }

    /// Applies the latest message score. `Blocked` is sticky.
    fn after_message(self, score: u8) -> Self {
        if self == RoomSafetyStatus::Blocked {
            RoomSafetyStatus::Blocked
        } else {
            Self::from_score(score)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    System,
    SafetyAlert,
}

/// A stored chat message.
///
/// Immutable once created except for `is_read` (read receipts) and
/// `is_flagged`/`moderation_status` (reports). `content` is the filtered
/// text; the raw input is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub is_flagged: bool,
    pub safety_score: u8,
    pub moderation_status: ModerationStatus,
    pub attachments: Vec<String>,
}

/// Read-mostly chat profile. Verification level and badges are maintained by
/// an external verification subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChatProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub verification_level: u8,
    /// Aggregate reputation, 0–100.
    pub safety_score: u8,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub response_time: String,
    pub badges: Vec<String>,
}

/// Audit entry retained for every report filed against a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReport {
    pub message_id: MessageId,
    pub reporter_id: UserId,
    pub reason: String,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RoomData {
    participants: [UserId; 2],
    item_id: Option<String>,
    messages: Vec<ChatMessage>,
    last_message: Option<ChatMessage>,
    unread_count: u32,
    is_active: bool,
    safety_status: RoomSafetyStatus,
    verification_required: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomData {
    fn new(participants: [UserId; 2], item_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            participants,
            item_id,
            messages: Vec::new(),
            last_message: None,
            // Seeded at zero; the send that created the room increments it
            // exactly once, so N unread sends always read back as N.
            unread_count: 0,
            is_active: true,
            safety_status: RoomSafetyStatus::Safe,
            verification_required: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn append(&mut self, message: ChatMessage) {
        self.safety_status = self.safety_status.after_message(message.safety_score);
        self.last_message = Some(message.clone());
        self.unread_count += 1;
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }
}

/// A conversation between exactly two participants, optionally scoped to an
/// item listing.
#[derive(Debug)]
pub struct ChatRoom {
    id: RoomId,
    inner: Mutex<RoomData>,
}

impl ChatRoom {
    fn new(id: RoomId, participants: [UserId; 2], item_id: Option<String>) -> Self {
        Self {
            id,
            inner: Mutex::new(RoomData::new(participants, item_id, Utc::now())),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn participants(&self) -> [UserId; 2] {
        self.inner.lock().participants
    }

    pub fn unread_count(&self) -> u32 {
        self.inner.lock().unread_count
    }

    pub fn safety_status(&self) -> RoomSafetyStatus {
        self.inner.lock().safety_status
    }

    /// Point-in-time copy of the room's denormalized state.
    pub fn snapshot(&self) -> RoomSnapshot {
        let data = self.inner.lock();
        RoomSnapshot {
            id: self.id,
            participants: data.participants,
            item_id: data.item_id.clone(),
            last_message: data.last_message.clone(),
            unread_count: data.unread_count,
            is_active: data.is_active,
            safety_status: data.safety_status,
            verification_required: data.verification_required,
            created_at: data.created_at,
            updated_at: data.updated_at,
            message_count: data.messages.len(),
        }
    }
}

/// Serializable view of a [`ChatRoom`] for listings and APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub participants: [UserId; 2],
    pub item_id: Option<String>,
    pub last_message: Option<ChatMessage>,
    pub unread_count: u32,
    pub is_active: bool,
    pub safety_status: RoomSafetyStatus,
    pub verification_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Chat engine owning rooms, messages, profiles, blocks, and reports.
pub struct ChatEngine {
    profiles: DashMap<UserId, UserChatProfile>,
    rooms: DashMap<RoomId, ChatRoom>,
    /// Normalized (low, high) participant pair -> room, for pair-scoped
    /// room reuse. Creation goes through the entry API so two concurrent
    /// first-sends cannot create duplicate rooms.
    rooms_by_pair: DashMap<(UserId, UserId), RoomId>,
    /// Message -> owning room, for report lookups.
    message_rooms: DashMap<MessageId, RoomId>,
    /// Blocker -> set of users they blocked (directional).
    blocks: DashMap<UserId, HashSet<UserId>>,
    /// Private safety notices per user; never part of a shared room.
    safety_notices: DashMap<UserId, Vec<ChatMessage>>,
    reports: DashMap<MessageId, Vec<MessageReport>>,
    next_room_id: AtomicU64,
    next_message_id: AtomicU64,
}

impl ChatEngine {
    /// Creates an engine with no rooms or profiles.
    pub fn new() -> Self {
        ChatEngine {
            profiles: DashMap::new(),
            rooms: DashMap::new(),
            rooms_by_pair: DashMap::new(),
            message_rooms: DashMap::new(),
            blocks: DashMap::new(),
            safety_notices: DashMap::new(),
            reports: DashMap::new(),
            next_room_id: AtomicU64::new(1),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Inserts or replaces a chat profile.
    ///
    /// Seeding sample profiles is the caller's job, done explicitly at
    /// startup — the engine never self-populates.
    pub fn register_profile(&self, profile: UserChatProfile) {
        self.profiles.insert(profile.user_id, profile);
    }

    pub fn user_profile(&self, user_id: UserId) -> Option<UserChatProfile> {
        self.profiles.get(&user_id).map(|p| p.value().clone())
    }

    /// Sends a message from `sender` to `receiver`.
    ///
    /// The raw text is filtered first; the stored message carries only the
    /// filtered content, its safety score, and the moderation status derived
    /// from that score. When no `room` is given, the room for the
    /// participant pair is reused or created atomically.
    ///
    /// A `Flagged` or `Blocked` result additionally leaves a private
    /// [`MessageType::SafetyAlert`] notice for the sender (see
    /// [`Self::safety_notices`]); the notice is not part of the room.
    ///
    /// # Errors
    ///
    /// - [`MarketError::SenderNotFound`] if the sender has no profile.
    /// - [`MarketError::SenderBlocked`] if the receiver blocked the sender.
    /// - [`MarketError::RoomNotFound`] / [`MarketError::NotRoomParticipant`]
    ///   when an explicit `room` is invalid for this sender.
    pub fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        room: Option<RoomId>,
    ) -> Result<ChatMessage, MarketError> {
        if !self.profiles.contains_key(&sender_id) {
            return Err(MarketError::SenderNotFound(sender_id));
        }
        if self.is_blocked(receiver_id, sender_id) {
            return Err(MarketError::SenderBlocked);
        }

        let outcome = filter::filter(content);
        let moderation_status = ModerationStatus::from_score(outcome.safety_score);

        let room_id = match room {
            Some(id) => {
                let room = self.rooms.get(&id).ok_or(MarketError::RoomNotFound(id))?;
                if !room.participants().contains(&sender_id) {
                    return Err(MarketError::NotRoomParticipant);
                }
                id
            }
            None => self.room_for_pair(sender_id, receiver_id),
        };

        let message = ChatMessage {
            id: MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed)),
            room_id,
            sender_id,
            receiver_id,
            content: outcome.content.clone(),
            message_type: MessageType::Text,
            timestamp: Utc::now(),
            is_read: false,
            is_flagged: !outcome.flags.is_empty(),
            safety_score: outcome.safety_score,
            moderation_status,
            attachments: Vec::new(),
        };

        {
            let room = self
                .rooms
                .get(&room_id)
                .ok_or(MarketError::RoomNotFound(room_id))?;
            room.inner.lock().append(message.clone());
        }
        self.message_rooms.insert(message.id, room_id);

        if matches!(
            moderation_status,
            ModerationStatus::Flagged | ModerationStatus::Blocked
        ) {
            tracing::warn!(
                message = %message.id,
                sender = %sender_id,
                score = outcome.safety_score,
                ?moderation_status,
                "message held by moderation"
            );
            self.push_safety_notice(sender_id, room_id, &outcome, moderation_status);
        }

        Ok(message)
    }

    /// Rooms the user participates in, most recently active first.
    pub fn get_chat_rooms(&self, user_id: UserId) -> Vec<RoomSnapshot> {
        let mut rooms: Vec<RoomSnapshot> = self
            .rooms
            .iter()
            .filter(|room| room.participants().contains(&user_id))
            .map(|room| room.snapshot())
            .collect();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.0.cmp(&a.id.0)));
        rooms
    }

    /// Messages of a room in send order.
    pub fn get_chat_messages(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, MarketError> {
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(MarketError::RoomNotFound(room_id))?;
        let data = room.inner.lock();
        Ok(data.messages.clone())
    }

    /// Snapshot of one room.
    pub fn room(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(&room_id).map(|room| room.snapshot())
    }

    /// Marks every message addressed to `user_id` in the room as read and
    /// resets the unread counter. Idempotent.
    ///
    /// # Errors
    ///
    /// [`MarketError::RoomNotFound`] for an unknown room.
    pub fn mark_messages_read(&self, room_id: RoomId, user_id: UserId) -> Result<(), MarketError> {
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(MarketError::RoomNotFound(room_id))?;
        let mut data = room.inner.lock();
        for message in data.messages.iter_mut() {
            if message.receiver_id == user_id {
                message.is_read = true;
            }
        }
        if let Some(last) = data.last_message.as_mut() {
            if last.receiver_id == user_id {
                last.is_read = true;
            }
        }
        data.unread_count = 0;
        Ok(())
    }

    /// Files a report against a message, forcing it to `Flagged` regardless
    /// of its original score. One-way: an `Approved` message is downgraded,
    /// a `Blocked` message stays `Blocked`. The room drops to at least
    /// `Warning`.
    ///
    /// # Errors
    ///
    /// - [`MarketError::MissingReason`] for an empty or blank reason.
    /// - [`MarketError::MessageNotFound`] for an unknown message id.
    pub fn report_message(
        &self,
        message_id: MessageId,
        reporter_id: UserId,
        reason: &str,
    ) -> Result<(), MarketError> {
        if reason.trim().is_empty() {
            return Err(MarketError::MissingReason);
        }
        let room_id = *self
            .message_rooms
            .get(&message_id)
            .ok_or(MarketError::MessageNotFound(message_id))?;
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(MarketError::MessageNotFound(message_id))?;

        let mut data = room.inner.lock();
        let message = data
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(MarketError::MessageNotFound(message_id))?;

        message.is_flagged = true;
        if message.moderation_status != ModerationStatus::Blocked {
            message.moderation_status = ModerationStatus::Flagged;
        }
        let status = message.moderation_status;

        if let Some(last) = data.last_message.as_mut() {
            if last.id == message_id {
                last.is_flagged = true;
                last.moderation_status = status;
            }
        }
        if data.safety_status == RoomSafetyStatus::Safe {
            data.safety_status = RoomSafetyStatus::Warning;
        }
        drop(data);

        self.reports.entry(message_id).or_default().push(MessageReport {
            message_id,
            reporter_id,
            reason: reason.trim().to_string(),
            reported_at: Utc::now(),
        });

        tracing::warn!(message = %message_id, reporter = %reporter_id, "message reported");
        Ok(())
    }

    /// Reports filed against a message, oldest first.
    pub fn reports_for(&self, message_id: MessageId) -> Vec<MessageReport> {
        self.reports
            .get(&message_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Records that `blocker_id` blocks `blocked_id` (directional).
    ///
    /// Future sends from the blocked user to the blocker are rejected.
    pub fn block_user(&self, blocker_id: UserId, blocked_id: UserId) {
        self.blocks.entry(blocker_id).or_default().insert(blocked_id);
        tracing::debug!(blocker = %blocker_id, blocked = %blocked_id, "user blocked");
    }

    /// Whether `blocker_id` has blocked `blocked_id`.
    pub fn is_blocked(&self, blocker_id: UserId, blocked_id: UserId) -> bool {
        self.blocks
            .get(&blocker_id)
            .map(|set| set.contains(&blocked_id))
            .unwrap_or(false)
    }

    /// Everyone this user has blocked.
    pub fn blocked_users(&self, blocker_id: UserId) -> Vec<UserId> {
        self.blocks
            .get(&blocker_id)
            .map(|set| {
                let mut users: Vec<UserId> = set.iter().copied().collect();
                users.sort();
                users
            })
            .unwrap_or_default()
    }

    /// Private safety-alert notices for a user, oldest first.
    pub fn safety_notices(&self, user_id: UserId) -> Vec<ChatMessage> {
        self.safety_notices
            .get(&user_id)
            .map(|n| n.value().clone())
            .unwrap_or_default()
    }

    fn room_for_pair(&self, a: UserId, b: UserId) -> RoomId {
        let key = if a <= b { (a, b) } else { (b, a) };
        match self.rooms_by_pair.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = RoomId(self.next_room_id.fetch_add(1, Ordering::Relaxed));
                self.rooms.insert(id, ChatRoom::new(id, [a, b], None));
                entry.insert(id);
                tracing::debug!(room = %id, a = %a, b = %b, "chat room created");
                id
            }
        }
    }

    fn push_safety_notice(
        &self,
        sender_id: UserId,
        room_id: RoomId,
        outcome: &FilterOutcome,
        status: ModerationStatus,
    ) {
        let notice_text = match status {
            ModerationStatus::Blocked => {
                "Your message was blocked by our family-safety filter. \
                 Please keep conversations on the platform and free of \
                 personal contact details."
            }
            _ => {
                "Your message was flagged by our family-safety filter and \
                 may be reviewed. Please keep it friendly."
            }
        };
        let notice = ChatMessage {
            id: MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed)),
            room_id,
            sender_id: SYSTEM_USER,
            receiver_id: sender_id,
            content: format!("{} (safety score: {})", notice_text, outcome.safety_score),
            message_type: MessageType::SafetyAlert,
            timestamp: Utc::now(),
            is_read: false,
            is_flagged: false,
            safety_score: 100,
            moderation_status: ModerationStatus::Approved,
            attachments: Vec::new(),
        };
        self.safety_notices.entry(sender_id).or_default().push(notice);
    }
}

impl Default for ChatEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_thresholds_are_exact() {
        assert_eq!(ModerationStatus::from_score(100), ModerationStatus::Approved);
        assert_eq!(ModerationStatus::from_score(70), ModerationStatus::Approved);
        assert_eq!(ModerationStatus::from_score(69), ModerationStatus::Flagged);
        assert_eq!(ModerationStatus::from_score(50), ModerationStatus::Flagged);
        assert_eq!(ModerationStatus::from_score(49), ModerationStatus::Blocked);
        assert_eq!(ModerationStatus::from_score(0), ModerationStatus::Blocked);
    }

    #[test]
    fn room_safety_blocked_is_sticky() {
        let status = RoomSafetyStatus::Safe.after_message(40);
        assert_eq!(status, RoomSafetyStatus::Blocked);
        // A later clean message does not lift the block.
        assert_eq!(status.after_message(100), RoomSafetyStatus::Blocked);
        // Warning does recover.
        assert_eq!(
            RoomSafetyStatus::Warning.after_message(100),
            RoomSafetyStatus::Safe
        );
    }

    #[test]
    fn pair_key_is_order_insensitive() {
        let engine = ChatEngine::new();
        let a = engine.room_for_pair(UserId(1), UserId(2));
        let b = engine.room_for_pair(UserId(2), UserId(1));
        assert_eq!(a, b);
        assert_eq!(engine.rooms.len(), 1);
    }
}
