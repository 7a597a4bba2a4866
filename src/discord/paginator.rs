//! Paginated lists
//!
//! Long lists are shown ten entries at a time with first/previous/next/last
//! buttons. The page state is kept here, keyed by the id of the interaction
//! that created the list; button custom ids carry that key.

use super::embed::Embed;
use serenity::builder::{CreateActionRow, CreateButton};
use serenity::model::application::ButtonStyle;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

pub const PAGE_SIZE: usize = 10;
/// Lists kept alive at once; the oldest is forgotten first.
const MAX_PAGERS: usize = 64;
const CUSTOM_ID_PREFIX: &str = "pager";

#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    Heading(String),
    Item(String),
}

pub fn format_list(entries: &[ListEntry]) -> String {
    entries
        .iter()
        .map(|entry| match entry {
            ListEntry::Heading(h) => format!("**{h}**"),
            ListEntry::Item(i) => format!("\u{2022} {i}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    First,
    Prev,
    Next,
    Last,
}

impl PageAction {
    const ALL: [PageAction; 4] = [Self::First, Self::Prev, Self::Next, Self::Last];

    fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Prev => "prev",
            Self::Next => "next",
            Self::Last => "last",
        }
    }

    fn emoji(self) -> char {
        match self {
            Self::First => '\u{23EE}',
            Self::Prev => '\u{25C0}',
            Self::Next => '\u{25B6}',
            Self::Last => '\u{23ED}',
        }
    }
}

pub fn custom_id(key: u64, action: PageAction) -> String {
    format!("{CUSTOM_ID_PREFIX}:{key}:{}", action.as_str())
}

pub fn parse_custom_id(id: &str) -> Option<(u64, PageAction)> {
    let mut parts = id.split(':');
    if parts.next()? != CUSTOM_ID_PREFIX {
        return None;
    }
    let key = parts.next()?.parse().ok()?;
    let action = parts.next()?;
    let action = PageAction::ALL.into_iter().find(|a| a.as_str() == action)?;
    parts.next().is_none().then_some((key, action))
}

/// Navigation buttons for the list identified by `key`.
pub fn components(key: u64) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(
        PageAction::ALL
            .into_iter()
            .map(|action| {
                CreateButton::new(custom_id(key, action))
                    .emoji(action.emoji())
                    .style(ButtonStyle::Secondary)
            })
            .collect(),
    )]
}

#[derive(Debug, Clone)]
pub struct Pager {
    owner: u64,
    entries: Vec<ListEntry>,
    template: Embed,
    page: usize,
}

impl Pager {
    pub fn new(owner: u64, entries: Vec<ListEntry>, template: Embed) -> Self {
        Self {
            owner,
            entries,
            template,
            page: 0,
        }
    }

    pub fn max_page(&self) -> usize {
        self.entries.len().div_ceil(PAGE_SIZE).saturating_sub(1)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn apply(&mut self, action: PageAction) {
        self.page = match action {
            PageAction::First => 0,
            PageAction::Prev => self.page.saturating_sub(1),
            PageAction::Next => (self.page + 1).min(self.max_page()),
            PageAction::Last => self.max_page(),
        };
    }

    pub fn embed(&self) -> Embed {
        tracing::debug!("Generating embed for page {}", self.page);

        let start = self.page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.entries.len());
        let description = if self.entries.is_empty() {
            "*Nothing to show.*".to_string()
        } else {
            format_list(&self.entries[start..end])
        };

        self.template
            .clone()
            .description(description)
            .footer(format!("page {}/{}", self.page + 1, self.max_page() + 1))
    }
}

/// Result of pressing a pager button.
#[derive(Debug, PartialEq)]
pub enum Press {
    Updated(Embed),
    NotOwner,
    Expired,
}

#[derive(Default)]
pub struct PagerRegistry {
    pagers: Mutex<BTreeMap<u64, Pager>>,
}

impl PagerRegistry {
    pub async fn insert(&self, key: u64, pager: Pager) {
        let mut pagers = self.pagers.lock().await;
        pagers.insert(key, pager);
        // Interaction ids are snowflakes, so the smallest key is the oldest list.
        while pagers.len() > MAX_PAGERS {
            pagers.pop_first();
        }
    }

    pub async fn press(&self, key: u64, user: u64, action: PageAction) -> Press {
        let mut pagers = self.pagers.lock().await;
        let Some(pager) = pagers.get_mut(&key) else {
            return Press::Expired;
        };
        if pager.owner != user {
            return Press::NotOwner;
        }
        pager.apply(action);
        Press::Updated(pager.embed())
    }
}
