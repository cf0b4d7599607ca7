//! Terminology Index
//!
//! An in-memory token/prefix index over the latest snapshot of every code
//! system. A [`SearchIndex`] is immutable once built; rebuilding produces a
//! new value that is installed through [`IndexHandle::publish`], so readers
//! always see one complete index.

use crate::builder::CodeSystemSnapshot;
use crate::normalize::CodeEntry;
use crate::text::{fold, normalize_phrase, tokenize, MIN_PREFIX_LEN};
use arc_swap::ArcSwap;
use medisync_models::{PublicationStatus, ValueSet, ValueSetExpansion, ValueSetExpansionContains};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How a hit matched the query; lower sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchRank {
    ExactCode,
    ExactDisplay,
    DisplayPrefix,
    TokenContainment,
}

impl MatchRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRank::ExactCode => "exact-code",
            MatchRank::ExactDisplay => "exact-display",
            MatchRank::DisplayPrefix => "display-prefix",
            MatchRank::TokenContainment => "token-containment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub entry: CodeEntry,
    /// Version of the snapshot the entry came from
    pub version: u32,
    pub rank: MatchRank,
}

/// One page of ranked results plus the total match count
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub total: usize,
    pub offset: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchPage {
    fn empty(offset: usize) -> Self {
        Self {
            total: 0,
            offset,
            hits: Vec::new(),
        }
    }

    /// Render as an expanded ValueSet; `query` and `limit` are echoed as
    /// expansion parameters
    pub fn to_value_set(&self, query: &str, limit: usize) -> ValueSet {
        let mut vs = ValueSet::new(PublicationStatus::Active);
        vs.expansion = Some(ValueSetExpansion {
            identifier: Some(format!("urn:uuid:{}", uuid::Uuid::new_v4())),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total: Some(self.total as u32),
            offset: Some(self.offset as u32),
            parameter: Some(vec![
                json!({"name": "filter", "valueString": query}),
                json!({"name": "count", "valueInteger": limit}),
                json!({"name": "offset", "valueInteger": self.offset}),
            ]),
            contains: self
                .hits
                .iter()
                .map(|hit| ValueSetExpansionContains {
                    system: Some(hit.entry.system.clone()),
                    version: Some(hit.version.to_string()),
                    code: Some(hit.entry.code.clone()),
                    display: Some(hit.entry.display.clone()),
                })
                .collect(),
        });
        vs
    }
}

/// Default and maximum page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl SearchLimits {
    /// Effective limit for a request; `Some(0)` stays 0 (count-only page).
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

#[derive(Debug)]
struct IndexedEntry {
    system: usize,
    entry: usize,
    code_norm: String,
    display_norm: String,
    display_words: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SearchIndex {
    generation: u64,
    systems: Vec<Arc<CodeSystemSnapshot>>,
    entries: Vec<IndexedEntry>,
    /// Whole tokens and word prefixes (3..len-1) to entry ordinals, ascending
    postings: HashMap<String, Vec<usize>>,
    /// Distinct whole tokens, for substring matching
    vocabulary: BTreeSet<String>,
    lookup: HashMap<(String, String), usize>,
}

impl SearchIndex {
    /// An index with no code systems and generation 0
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index with generation 0
    pub fn build<I>(systems: I) -> Self
    where
        I: IntoIterator<Item = Arc<CodeSystemSnapshot>>,
    {
        Self::with_generation(0, systems)
    }

    /// Build from any number of snapshots; only the highest version of each
    /// canonical URL is indexed. URL order follows first appearance.
    pub fn with_generation<I>(generation: u64, systems: I) -> Self
    where
        I: IntoIterator<Item = Arc<CodeSystemSnapshot>>,
    {
        let mut latest: Vec<Arc<CodeSystemSnapshot>> = Vec::new();
        let mut by_url: HashMap<String, usize> = HashMap::new();
        for snapshot in systems {
            match by_url.get(&snapshot.url) {
                Some(&pos) => {
                    if snapshot.version > latest[pos].version {
                        latest[pos] = snapshot;
                    }
                }
                None => {
                    by_url.insert(snapshot.url.clone(), latest.len());
                    latest.push(snapshot);
                }
            }
        }

        let mut index = SearchIndex {
            generation,
            ..Default::default()
        };

        for (system_ordinal, snapshot) in latest.iter().enumerate() {
            for (entry_ordinal, entry) in snapshot.entries().iter().enumerate() {
                let ordinal = index.entries.len();
                for token in &entry.search_text {
                    index.add_posting(token, ordinal);
                    index.vocabulary.insert(token.clone());

                    let chars: Vec<(usize, char)> = token.char_indices().collect();
                    for len in MIN_PREFIX_LEN..chars.len() {
                        let end = chars[len].0;
                        index.add_posting(&token[..end], ordinal);
                    }
                }

                index
                    .lookup
                    .entry((snapshot.url.clone(), entry.code_key.clone()))
                    .or_insert(ordinal);

                let display_words = tokenize(&entry.display);
                index.entries.push(IndexedEntry {
                    system: system_ordinal,
                    entry: entry_ordinal,
                    code_norm: normalize_phrase(&entry.code),
                    display_norm: display_words.join(" "),
                    display_words,
                });
            }
        }
        index.systems = latest;

        tracing::debug!(
            generation,
            systems = index.systems.len(),
            entries = index.entries.len(),
            postings = index.postings.len(),
            "search index built"
        );
        index
    }

    fn add_posting(&mut self, key: &str, ordinal: usize) {
        let list = self.postings.entry(key.to_string()).or_default();
        if list.last() != Some(&ordinal) {
            list.push(ordinal);
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Indexed snapshots (latest version per URL)
    pub fn systems(&self) -> &[Arc<CodeSystemSnapshot>] {
        &self.systems
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_at(&self, ordinal: usize) -> (&CodeSystemSnapshot, &CodeEntry) {
        let indexed = &self.entries[ordinal];
        let snapshot = &self.systems[indexed.system];
        (snapshot, &snapshot.entries()[indexed.entry])
    }

    /// Exact lookup by system URL and code (case-insensitive)
    pub fn lookup(&self, system: &str, code: &str) -> Option<&CodeEntry> {
        self.lookup
            .get(&(system.to_string(), code.trim().to_lowercase()))
            .map(|&ordinal| self.entry_at(ordinal).1)
    }

    /// Indexed snapshot for a canonical URL
    pub fn system(&self, url: &str) -> Option<&Arc<CodeSystemSnapshot>> {
        self.systems.iter().find(|s| s.url == url)
    }

    /// Ranked, paginated search.
    ///
    /// Queries with fewer than three alphanumeric characters return an empty
    /// page without touching the postings.
    pub fn search(&self, query: &str, limit: usize, offset: usize) -> SearchPage {
        let words = tokenize(query);
        let significant: usize = words.iter().map(|w| w.chars().count()).sum();
        if significant < MIN_PREFIX_LEN {
            return SearchPage::empty(offset);
        }

        let mut candidates: Option<BTreeSet<usize>> = None;
        for word in &words {
            let matched = self.matches_for(word);
            candidates = Some(match candidates {
                None => matched,
                Some(previous) => previous.intersection(&matched).copied().collect(),
            });
            if candidates.as_ref().is_some_and(BTreeSet::is_empty) {
                return SearchPage::empty(offset);
            }
        }

        let query_norm = words.join(" ");
        let query_code = fold(query.trim());
        let mut ranked: Vec<(MatchRank, usize)> = candidates
            .unwrap_or_default()
            .into_iter()
            .map(|ordinal| (self.rank(ordinal, &words, &query_norm, &query_code), ordinal))
            .collect();
        ranked.sort();

        let hits = ranked
            .iter()
            .skip(offset)
            .take(limit)
            .map(|&(rank, ordinal)| {
                let (snapshot, entry) = self.entry_at(ordinal);
                SearchHit {
                    entry: entry.clone(),
                    version: snapshot.version,
                    rank,
                }
            })
            .collect();

        SearchPage {
            total: ranked.len(),
            offset,
            hits,
        }
    }

    fn matches_for(&self, word: &str) -> BTreeSet<usize> {
        let mut matched: BTreeSet<usize> = self
            .postings
            .get(word)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default();

        if word.chars().count() >= MIN_PREFIX_LEN {
            // prefixes are already in the postings; only interior substrings remain
            for token in &self.vocabulary {
                if token.len() > word.len() && !token.starts_with(word) && token.contains(word) {
                    if let Some(list) = self.postings.get(token) {
                        matched.extend(list.iter().copied());
                    }
                }
            }
        }
        matched
    }

    fn rank(
        &self,
        ordinal: usize,
        words: &[String],
        query_norm: &str,
        query_code: &str,
    ) -> MatchRank {
        let indexed = &self.entries[ordinal];
        let (_, entry) = self.entry_at(ordinal);

        if entry.code_key == query_code || indexed.code_norm == query_norm {
            MatchRank::ExactCode
        } else if indexed.display_norm == query_norm {
            MatchRank::ExactDisplay
        } else if indexed.display_norm.starts_with(query_norm)
            || words
                .iter()
                .all(|w| indexed.display_words.iter().any(|d| d.starts_with(w.as_str())))
        {
            MatchRank::DisplayPrefix
        } else {
            MatchRank::TokenContainment
        }
    }
}

/// Owner of the current index.
///
/// Every rebuild reserves a generation from the handle's counter before it
/// starts; `publish` installs an index only when its generation is newer than
/// the installed one, so a slow stale rebuild cannot replace a fresher index.
#[derive(Debug)]
pub struct IndexHandle {
    current: ArcSwap<SearchIndex>,
    generations: AtomicU64,
}

impl Default for IndexHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexHandle {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(SearchIndex::empty()),
            generations: AtomicU64::new(0),
        }
    }

    /// Reserve the generation number for a rebuild about to start
    pub fn reserve_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current index; stays valid even if a newer one is published meanwhile
    pub fn snapshot(&self) -> Arc<SearchIndex> {
        self.current.load_full()
    }

    /// Generation of the installed index
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Install `index` if it is newer than the current one. Returns whether it
    /// was installed.
    pub fn publish(&self, index: SearchIndex) -> bool {
        let candidate = Arc::new(index);
        let previous = self.current.rcu(|current| {
            if candidate.generation > current.generation {
                Arc::clone(&candidate)
            } else {
                Arc::clone(current)
            }
        });
        let installed = previous.generation < candidate.generation;
        if installed {
            tracing::info!(
                generation = candidate.generation,
                entries = candidate.len(),
                "search index published"
            );
        } else {
            tracing::debug!(
                generation = candidate.generation,
                current = previous.generation,
                "stale search index discarded"
            );
        }
        installed
    }

    /// Build and publish in one step
    pub fn rebuild<I>(&self, systems: I) -> bool
    where
        I: IntoIterator<Item = Arc<CodeSystemSnapshot>>,
    {
        let generation = self.reserve_generation();
        self.publish(SearchIndex::with_generation(generation, systems))
    }
}
