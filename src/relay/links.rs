//! Bounded bookkeeping of forwarded messages.

use std::collections::{HashMap, HashSet, VecDeque};

/// Forwarded messages of one chat, oldest first.
#[derive(Debug, Default)]
struct ChatLinks {
    order: VecDeque<String>,
    /// WhatsApp message id -> Discord channel id -> Discord message id.
    messages: HashMap<String, HashMap<u64, u64>>,
}

/// Remembers which Discord message each forwarded WhatsApp message became,
/// keeping at most `limit` WhatsApp messages per chat.
#[derive(Debug)]
pub struct MessageLinks {
    limit: usize,
    chats: HashMap<String, ChatLinks>,
}

impl MessageLinks {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            chats: HashMap::new(),
        }
    }

    pub fn record(&mut self, chat_jid: &str, whatsapp_id: &str, channel_id: u64, discord_id: u64) {
        let chat = self.chats.entry(chat_jid.to_string()).or_default();

        if !chat.messages.contains_key(whatsapp_id) {
            chat.order.push_back(whatsapp_id.to_string());
        }
        chat.messages
            .entry(whatsapp_id.to_string())
            .or_default()
            .insert(channel_id, discord_id);

        while chat.order.len() > self.limit {
            if let Some(oldest) = chat.order.pop_front() {
                chat.messages.remove(&oldest);
            }
        }
    }

    pub fn get(&self, chat_jid: &str, whatsapp_id: &str, channel_id: u64) -> Option<u64> {
        self.chats
            .get(chat_jid)?
            .messages
            .get(whatsapp_id)?
            .get(&channel_id)
            .copied()
    }

    /// Number of WhatsApp messages tracked for `chat_jid`.
    pub fn len(&self, chat_jid: &str) -> usize {
        self.chats.get(chat_jid).map_or(0, |c| c.order.len())
    }
}

/// Fixed-capacity set of recently seen ids, evicting the oldest.
#[derive(Debug)]
pub struct RecentIds {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, id: String) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_and_get_per_channel() {
        let mut links = MessageLinks::new(10);
        links.record("1@g.us", "A", 100, 900);
        links.record("1@g.us", "A", 101, 901);

        assert_eq!(links.get("1@g.us", "A", 100), Some(900));
        assert_eq!(links.get("1@g.us", "A", 101), Some(901));
        assert_eq!(links.get("1@g.us", "A", 102), None);
        assert_eq!(links.get("2@g.us", "A", 100), None);
        assert_eq!(links.len("1@g.us"), 1);
    }

    #[test]
    fn test_oldest_message_is_evicted() {
        let mut links = MessageLinks::new(2);
        links.record("c", "A", 1, 10);
        links.record("c", "B", 1, 11);
        links.record("c", "C", 1, 12);

        assert_eq!(links.get("c", "A", 1), None);
        assert_eq!(links.get("c", "B", 1), Some(11));
        assert_eq!(links.get("c", "C", 1), Some(12));
    }

    #[test]
    fn test_recent_ids_capacity() {
        let mut ids = RecentIds::new(2);
        ids.insert("a".into());
        ids.insert("b".into());
        ids.insert("a".into());
        ids.insert("c".into());
        assert!(!ids.contains("a"));
        assert!(ids.contains("b"));
        assert!(ids.contains("c"));
    }

    proptest! {
        #[test]
        fn prop_links_stay_bounded(
            limit in 1usize..8,
            ops in prop::collection::vec((0u8..3, 0u16..40, 0u64..3), 0..200),
        ) {
            let mut links = MessageLinks::new(limit);
            for (chat, id, channel) in &ops {
                let chat = format!("{chat}@g.us");
                let id = id.to_string();
                links.record(&chat, &id, *channel, 7);
                prop_assert!(links.len(&chat) <= limit);
                prop_assert_eq!(links.get(&chat, &id, *channel), Some(7));
            }
        }
    }
}
