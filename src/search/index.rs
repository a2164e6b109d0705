// Derived tokenized index. Documents carry per-field token streams for
// every profile, computed once at index time; posting lists narrow query
// evaluation to candidate documents.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{Id, Post, SearchKind, User};

use super::tokenizer::{tokenize, Profile};

/// Username outranks bio; post content is the baseline.
pub const WEIGHT_USERNAME: f64 = 2.0;
pub const WEIGHT_BIO: f64 = 1.0;
pub const WEIGHT_CONTENT: f64 = 1.0;

pub type DocKey = (SearchKind, Id);

#[derive(Debug, Clone)]
pub struct IndexedField {
    pub weight: f64,
    /// One ordered token stream per profile (`Profile::idx`).
    pub streams: [Vec<String>; 3],
}

impl IndexedField {
    fn new(text: &str, weight: f64) -> Self {
        Self {
            weight,
            streams: [
                tokenize(text, Profile::English),
                tokenize(text, Profile::Turkish),
                tokenize(text, Profile::Bilingual),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub id: Id,
    pub kind: SearchKind,
    /// Author for posts; the user themselves for user documents.
    pub owner_id: Id,
    /// Username for users, content for posts. Drives display and the
    /// name tie-break.
    pub title: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<IndexedField>,
}

impl IndexedDoc {
    pub fn from_user(user: &User) -> Self {
        let mut fields = vec![IndexedField::new(&user.username, WEIGHT_USERNAME)];
        if let Some(bio) = &user.bio {
            fields.push(IndexedField::new(bio, WEIGHT_BIO));
        }
        Self {
            id: user.id,
            kind: SearchKind::User,
            owner_id: user.id,
            title: user.username.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at,
            fields,
        }
    }

    pub fn from_post(post: &Post) -> Self {
        let content = post.content.clone().unwrap_or_default();
        Self {
            id: post.id,
            kind: SearchKind::Post,
            owner_id: post.author_id,
            title: content.clone(),
            bio: None,
            created_at: post.created_at,
            fields: vec![IndexedField::new(&content, WEIGHT_CONTENT)],
        }
    }

    /// Weighted term frequency of `term` across this document's fields.
    pub fn term_score(&self, profile: Profile, term: &str) -> f64 {
        let p = profile.idx();
        self.fields
            .iter()
            .map(|f| {
                let tf = f.streams[p].iter().filter(|t| t.as_str() == term).count();
                tf as f64 * f.weight
            })
            .sum()
    }

    /// Whether the token sequence occurs consecutively within one field.
    pub fn has_phrase(&self, profile: Profile, phrase: &[String]) -> bool {
        if phrase.is_empty() {
            return true;
        }
        let p = profile.idx();
        self.fields.iter().any(|f| {
            let stream = &f.streams[p];
            stream
                .windows(phrase.len())
                .any(|w| w.iter().zip(phrase).all(|(a, b)| a == b))
        })
    }
}

#[derive(Debug, Default)]
pub struct SearchIndex {
    docs: HashMap<DocKey, IndexedDoc>,
    /// Per-profile posting lists: token -> documents containing it.
    postings: [HashMap<String, HashSet<DocKey>>; 3],
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, doc: IndexedDoc) {
        let key = (doc.kind, doc.id);
        self.remove(doc.kind, doc.id);
        for profile in Profile::ALL {
            let p = profile.idx();
            for field in &doc.fields {
                for token in &field.streams[p] {
                    self.postings[p]
                        .entry(token.clone())
                        .or_default()
                        .insert(key);
                }
            }
        }
        self.docs.insert(key, doc);
    }

    pub fn remove(&mut self, kind: SearchKind, id: Id) {
        let key = (kind, id);
        let Some(doc) = self.docs.remove(&key) else {
            return;
        };
        for profile in Profile::ALL {
            let p = profile.idx();
            for field in &doc.fields {
                for token in &field.streams[p] {
                    if let Some(set) = self.postings[p].get_mut(token) {
                        set.remove(&key);
                        if set.is_empty() {
                            self.postings[p].remove(token);
                        }
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        for postings in &mut self.postings {
            postings.clear();
        }
    }

    pub fn doc(&self, key: &DocKey) -> Option<&IndexedDoc> {
        self.docs.get(key)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Documents of `kind` containing `term` under `profile`.
    pub fn candidates(&self, profile: Profile, kind: SearchKind, term: &str) -> Vec<DocKey> {
        self.postings[profile.idx()]
            .get(term)
            .map(|set| set.iter().copied().filter(|(k, _)| *k == kind).collect())
            .unwrap_or_default()
    }

    pub fn keys_of_kind(&self, kind: SearchKind) -> Vec<DocKey> {
        self.docs.keys().copied().filter(|(k, _)| *k == kind).collect()
    }
}
