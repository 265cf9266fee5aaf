//! In-memory index: token -> entry, plus public id -> candidates.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::domain::{Entry, PublicId, Token};

#[derive(Default)]
pub(crate) struct Index {
    entries: HashMap<Token, Entry>,
    /// Candidates per public id, keyed by insertion sequence.
    by_public_id: HashMap<PublicId, BTreeMap<u64, Token>>,
    /// Tokens whose blob is being written but not yet registered.
    reserved: HashSet<Token>,
    next_seq: u64,
}

impl Index {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn reserved_len(&self) -> usize {
        self.reserved.len()
    }

    /// Claim `token` for an upload. False if it is registered or already claimed.
    pub(crate) fn reserve(&mut self, token: &Token) -> bool {
        !self.entries.contains_key(token) && self.reserved.insert(token.clone())
    }

    pub(crate) fn release(&mut self, token: &Token) {
        self.reserved.remove(token);
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn insert(&mut self, entry: Entry) {
        self.reserved.remove(&entry.token);
        self.by_public_id
            .entry(entry.public_id.clone())
            .or_default()
            .insert(entry.seq, entry.token.clone());
        self.entries.insert(entry.token.clone(), entry);
    }

    pub(crate) fn get(&self, token: &Token) -> Option<&Entry> {
        self.entries.get(token)
    }

    pub(crate) fn remove(&mut self, token: &Token) -> Option<Entry> {
        let entry = self.entries.remove(token)?;
        if let Some(candidates) = self.by_public_id.get_mut(&entry.public_id) {
            candidates.remove(&entry.seq);
            if candidates.is_empty() {
                self.by_public_id.remove(&entry.public_id);
            }
        }
        Some(entry)
    }

    /// Most recently inserted entry carrying `public_id`.
    pub(crate) fn newest_for(&self, public_id: &PublicId) -> Option<&Entry> {
        let (_, token) = self.by_public_id.get(public_id)?.last_key_value()?;
        self.entries.get(token)
    }

    pub(crate) fn expired_for(&self, public_id: &PublicId, now: DateTime<Utc>) -> Vec<Token> {
        self.by_public_id
            .get(public_id)
            .into_iter()
            .flat_map(|candidates| candidates.values())
            .filter(|token| self.entries.get(*token).is_some_and(|e| e.is_expired_at(now)))
            .cloned()
            .collect()
    }

    pub(crate) fn expired(&self, now: DateTime<Utc>) -> Vec<Token> {
        self.entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.token.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(index: &mut Index, token: &str, public_id: &str, expires_at: DateTime<Utc>) -> Entry {
        Entry {
            token: Token::parse(token).unwrap(),
            original_name: public_id.to_string(),
            public_id: PublicId::lookup_key(public_id),
            created_at: expires_at - Duration::minutes(10),
            expires_at,
            stored_size: 0,
            seq: index.next_seq(),
        }
    }

    #[test]
    fn newest_candidate_wins_regardless_of_token_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut index = Index::default();

        let older = entry(&mut index, "zzzz", "a.pdf", t0);
        let newer = entry(&mut index, "aaaa", "a.pdf", t0);
        index.insert(older);
        index.insert(newer.clone());

        let id = PublicId::lookup_key("a.pdf");
        assert_eq!(index.newest_for(&id).unwrap().token, newer.token);

        index.remove(&newer.token);
        assert_eq!(index.newest_for(&id).unwrap().token.as_str(), "zzzz");

        index.remove(&Token::parse("zzzz").unwrap());
        assert!(index.newest_for(&id).is_none());
        assert!(index.by_public_id.is_empty());
    }

    #[test]
    fn reservation_blocks_duplicates() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut index = Index::default();
        let token = Token::parse("tok").unwrap();

        assert!(index.reserve(&token));
        assert!(!index.reserve(&token));

        let e = entry(&mut index, "tok", "a.pdf", t0);
        index.insert(e);
        assert_eq!(index.reserved_len(), 0);
        assert!(!index.reserve(&token));
    }

    #[test]
    fn expired_lists_only_past_entries() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut index = Index::default();
        let past = entry(&mut index, "past", "a.pdf", t0);
        let future = entry(&mut index, "future", "a.pdf", t0 + Duration::minutes(5));
        index.insert(past);
        index.insert(future);

        let expired = index.expired(t0);
        assert_eq!(expired, vec![Token::parse("past").unwrap()]);
        assert_eq!(
            index.expired_for(&PublicId::lookup_key("a.pdf"), t0),
            vec![Token::parse("past").unwrap()]
        );
    }
}
