use std::collections::HashMap;

use super::{Author, Ban, Donate, TextMessage};

/// One page of chat activity: the items delivered with a single frame plus
/// the cursor for the page that follows. Items are keyed by id; adding an
/// id that is already present keeps the first value.
#[derive(Debug, Default, Clone)]
pub struct ChatMessages {
    next_page_token: String,
    text_messages: HashMap<String, TextMessage>,
    bans: HashMap<String, Ban>,
    donates: HashMap<String, Donate>,
    authors: HashMap<String, Author>,
}

impl ChatMessages {
    pub fn new(next_page_token: impl Into<String>) -> Self {
        Self {
            next_page_token: next_page_token.into(),
            ..Self::default()
        }
    }

    pub fn next_page_token(&self) -> &str {
        &self.next_page_token
    }

    pub fn add_text_message(&mut self, message: TextMessage) {
        self.text_messages
            .entry(message.id().to_string())
            .or_insert(message);
    }

    pub fn text_messages(&self) -> Vec<TextMessage> {
        self.text_messages.values().cloned().collect()
    }

    pub fn add_ban(&mut self, ban: Ban) {
        self.bans.entry(ban.id().to_string()).or_insert(ban);
    }

    pub fn bans(&self) -> Vec<Ban> {
        self.bans.values().cloned().collect()
    }

    pub fn add_donate(&mut self, donate: Donate) {
        self.donates.entry(donate.id().to_string()).or_insert(donate);
    }

    pub fn donates(&self) -> Vec<Donate> {
        self.donates.values().cloned().collect()
    }

    pub fn add_author(&mut self, author: Author) {
        self.authors.entry(author.id().to_string()).or_insert(author);
    }

    pub fn authors(&self) -> Vec<Author> {
        self.authors.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text_messages.is_empty()
            && self.bans.is_empty()
            && self.donates.is_empty()
            && self.authors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn text(id: &str, body: &str) -> TextMessage {
        TextMessage::new(
            id.into(),
            "v1".into(),
            "a1".into(),
            body.into(),
            Utc.with_ymd_and_hms(2024, 5, 2, 18, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn author(id: &str, name: &str) -> Author {
        Author::new(id.into(), name.into(), "https://example.com/p.jpg".into(), false).unwrap()
    }

    #[test]
    fn first_value_wins_on_duplicate_id() {
        let mut cm = ChatMessages::new("t1");

        cm.add_text_message(text("m1", "first"));
        cm.add_text_message(text("m1", "second"));

        let texts = cm.text_messages();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].text(), "first");
    }

    #[test]
    fn authors_dedup_too() {
        let mut cm = ChatMessages::new("");

        cm.add_author(author("a1", "first"));
        cm.add_author(author("a1", "second"));
        cm.add_author(author("a2", "other"));

        let mut names: Vec<String> =
            cm.authors().iter().map(|a| a.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["first".to_string(), "other".to_string()]);
    }

    #[test]
    fn empty_batch() {
        let cm = ChatMessages::new("t1");

        assert!(cm.is_empty());
        assert_eq!(cm.next_page_token(), "t1");
    }
}
