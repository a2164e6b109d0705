// Query evaluation. The default variant treats a query as a union of
// terms ranked by weighted term frequency; the advanced variant adds
// explicit AND/OR/NOT connectives, grouping, and quoted phrases.

use std::cmp::Ordering;

use crate::error::{AppError, AppResult};
use crate::models::SearchKind;

use super::index::{DocKey, SearchIndex};
use super::tokenizer::{tokenize, Profile};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A single term, normalized at evaluation time.
    Term(String),
    /// A quoted phrase matched by token adjacency within one field.
    Phrase(String),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Word(String),
    Phrase(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

fn lex(query: &str) -> AppResult<Vec<Lexeme>> {
    let mut out = Vec::new();
    let mut chars = query.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '"' => {
                chars.next();
                let mut phrase = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    phrase.push(c);
                }
                if !closed {
                    return Err(AppError::Validation("unterminated phrase quote".to_string()));
                }
                out.push(Lexeme::Phrase(phrase));
            }
            '(' => {
                chars.next();
                out.push(Lexeme::Open);
            }
            ')' => {
                chars.next();
                out.push(Lexeme::Close);
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '"' || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                match word.to_ascii_uppercase().as_str() {
                    "AND" => out.push(Lexeme::And),
                    "OR" => out.push(Lexeme::Or),
                    "NOT" => out.push(Lexeme::Not),
                    _ => out.push(Lexeme::Word(word)),
                }
            }
        }
    }
    Ok(out)
}

struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

/// Recursive descent over: or := and (OR and)* ; and := unary ((AND)? unary)* ;
/// unary := NOT unary | "(" or ")" | word | phrase. Adjacent terms without a
/// connective conjoin, matching the implicit-AND reading of plain queries.
impl Parser {
    fn new(lexemes: Vec<Lexeme>) -> Self {
        Self { lexemes, pos: 0 }
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn parse_or(&mut self) -> AppResult<QueryNode> {
        let mut nodes = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Lexeme::Or)) {
            self.next();
            nodes.push(self.parse_and()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            QueryNode::Or(nodes)
        })
    }

    fn parse_and(&mut self) -> AppResult<QueryNode> {
        let mut nodes = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                Some(Lexeme::And) => {
                    self.next();
                    nodes.push(self.parse_unary()?);
                }
                Some(Lexeme::Word(_)) | Some(Lexeme::Phrase(_)) | Some(Lexeme::Not)
                | Some(Lexeme::Open) => {
                    nodes.push(self.parse_unary()?);
                }
                _ => break,
            }
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            QueryNode::And(nodes)
        })
    }

    fn parse_unary(&mut self) -> AppResult<QueryNode> {
        match self.next() {
            Some(Lexeme::Not) => Ok(QueryNode::Not(Box::new(self.parse_unary()?))),
            Some(Lexeme::Open) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(Lexeme::Close) => Ok(node),
                    _ => Err(AppError::Validation("unbalanced parentheses in query".to_string())),
                }
            }
            Some(Lexeme::Word(w)) => Ok(QueryNode::Term(w)),
            Some(Lexeme::Phrase(p)) => Ok(QueryNode::Phrase(p)),
            other => Err(AppError::Validation(format!(
                "unexpected token in query: {:?}",
                other
            ))),
        }
    }
}

pub fn parse_query(query: &str) -> AppResult<QueryNode> {
    let lexemes = lex(query)?;
    if lexemes.is_empty() {
        return Err(AppError::Validation("query must not be empty".to_string()));
    }
    let mut parser = Parser::new(lexemes);
    let node = parser.parse_or()?;
    if parser.peek().is_some() {
        return Err(AppError::Validation("trailing tokens in query".to_string()));
    }
    Ok(node)
}

/// A ranked document key. Tie-breaks are applied by the caller, which
/// knows whether recency or name order is wanted.
#[derive(Debug, Clone)]
pub struct RankedDoc {
    pub key: DocKey,
    pub rank: f64,
}

fn rank_candidates(
    index: &SearchIndex,
    profile: Profile,
    kind: SearchKind,
    terms: &[String],
) -> Vec<RankedDoc> {
    let mut keys: Vec<DocKey> = Vec::new();
    for term in terms {
        for key in index.candidates(profile, kind, term) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    let mut ranked = Vec::new();
    for key in keys {
        let Some(doc) = index.doc(&key) else { continue };
        let rank: f64 = terms.iter().map(|t| doc.term_score(profile, t)).sum();
        if rank > 0.0 {
            ranked.push(RankedDoc { key, rank });
        }
    }
    ranked
}

/// Default variant: the query is an implicit union of terms; every
/// matching document is ranked by its summed weighted term frequency.
pub fn evaluate_simple(
    index: &SearchIndex,
    profile: Profile,
    kind: SearchKind,
    query: &str,
) -> Vec<RankedDoc> {
    let mut terms: Vec<String> = Vec::new();
    for term in tokenize(query, profile) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    rank_candidates(index, profile, kind, &terms)
}

fn matches(index: &SearchIndex, profile: Profile, key: &DocKey, node: &QueryNode) -> bool {
    let Some(doc) = index.doc(key) else {
        return false;
    };
    match node {
        QueryNode::Term(raw) => {
            let normalized = tokenize(raw, profile);
            // A term that normalizes away (stopword) constrains nothing.
            normalized
                .iter()
                .all(|t| doc.term_score(profile, t) > 0.0)
        }
        QueryNode::Phrase(raw) => {
            let normalized = tokenize(raw, profile);
            doc.has_phrase(profile, &normalized)
        }
        QueryNode::And(nodes) => nodes.iter().all(|n| matches(index, profile, key, n)),
        QueryNode::Or(nodes) => nodes.iter().any(|n| matches(index, profile, key, n)),
        QueryNode::Not(inner) => !matches(index, profile, key, inner),
    }
}

/// Positive terms of the tree (everything outside NOT scopes), used both
/// for candidate pruning and for ranking matched documents.
fn positive_terms(node: &QueryNode, profile: Profile, out: &mut Vec<String>) {
    match node {
        QueryNode::Term(raw) | QueryNode::Phrase(raw) => {
            for t in tokenize(raw, profile) {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
        QueryNode::And(nodes) | QueryNode::Or(nodes) => {
            for n in nodes {
                positive_terms(n, profile, out);
            }
        }
        QueryNode::Not(_) => {}
    }
}

fn contains_not(node: &QueryNode) -> bool {
    match node {
        QueryNode::Term(_) | QueryNode::Phrase(_) => false,
        QueryNode::And(nodes) | QueryNode::Or(nodes) => nodes.iter().any(contains_not),
        QueryNode::Not(_) => true,
    }
}

/// Advanced variant: boolean connectives and phrases. Matching documents
/// are ranked by the positive terms they contain.
pub fn evaluate_boolean(
    index: &SearchIndex,
    profile: Profile,
    kind: SearchKind,
    query: &str,
) -> AppResult<Vec<RankedDoc>> {
    let node = parse_query(query)?;
    let mut terms = Vec::new();
    positive_terms(&node, profile, &mut terms);

    // Posting-list pruning is only sound for purely positive trees: a NOT
    // branch can satisfy documents that contain none of the terms.
    let keys = if terms.is_empty() || contains_not(&node) {
        index.keys_of_kind(kind)
    } else {
        let mut keys: Vec<DocKey> = Vec::new();
        for term in &terms {
            for key in index.candidates(profile, kind, term) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    };

    let mut ranked = Vec::new();
    for key in keys {
        if !matches(index, profile, &key, &node) {
            continue;
        }
        let Some(doc) = index.doc(&key) else { continue };
        let rank: f64 = terms.iter().map(|t| doc.term_score(profile, t)).sum();
        ranked.push(RankedDoc {
            key,
            rank: if terms.is_empty() { 1.0 } else { rank },
        });
    }
    Ok(ranked)
}

/// Rank descending; equal ranks fall back to the provided tie-break.
pub fn sort_ranked<F>(ranked: &mut [RankedDoc], tie: F)
where
    F: Fn(&DocKey, &DocKey) -> Ordering,
{
    ranked.sort_by(|a, b| {
        b.rank
            .partial_cmp(&a.rank)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie(&a.key, &b.key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_implicit_and() {
        let node = parse_query("coffee roast").unwrap();
        assert_eq!(
            node,
            QueryNode::And(vec![
                QueryNode::Term("coffee".to_string()),
                QueryNode::Term("roast".to_string()),
            ])
        );
    }

    #[test]
    fn parses_connectives_and_grouping() {
        let node = parse_query("coffee AND (tea OR NOT milk)").unwrap();
        assert_eq!(
            node,
            QueryNode::And(vec![
                QueryNode::Term("coffee".to_string()),
                QueryNode::Or(vec![
                    QueryNode::Term("tea".to_string()),
                    QueryNode::Not(Box::new(QueryNode::Term("milk".to_string()))),
                ]),
            ])
        );
    }

    #[test]
    fn parses_phrases() {
        let node = parse_query("\"single origin\" beans").unwrap();
        assert_eq!(
            node,
            QueryNode::And(vec![
                QueryNode::Phrase("single origin".to_string()),
                QueryNode::Term("beans".to_string()),
            ])
        );
    }

    #[test]
    fn rejects_malformed_queries() {
        assert!(parse_query("").is_err());
        assert!(parse_query("\"unterminated").is_err());
        assert!(parse_query("(coffee").is_err());
        assert!(parse_query("coffee OR").is_err());
    }
}
