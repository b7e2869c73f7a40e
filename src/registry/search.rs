//! Fuzzy package search over namespace and name fields.
//!
//! Identifiers are split on `/` and `-`, lowercased, and expanded into all
//! n-grams of length 2 and up. A term matches a field when every gram of
//! the term is present, which makes incomplete fragments like `co` find
//! `core` without ranking unrelated packages.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::SEARCHABLE_COMPILER_VERSIONS;
use crate::data::package::{Package, PackageInfo, PackageName};
use crate::data::version::Version;

/// Shortest indexed fragment; single characters are never matched.
const MIN_GRAM: usize = 2;

/// Search results are capped at this many packages.
const RESULT_LIMIT: usize = 5;

/// Namespace matches outrank name matches.
const NAMESPACE_BOOST: f64 = 1.5;

fn token_split() -> &'static Regex {
    static TOKEN_SPLIT: OnceLock<Regex> = OnceLock::new();
    TOKEN_SPLIT.get_or_init(|| Regex::new("[/-]").expect("static regex"))
}

fn tokenize(text: &str) -> Vec<String> {
    token_split()
        .split(&text.to_lowercase())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// All n-grams of length [`MIN_GRAM`] and up, per token.
fn grams(text: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    for token in tokenize(text) {
        let chars: Vec<char> = token.chars().collect();
        for start in 0..chars.len() {
            for end in (start + MIN_GRAM)..=chars.len() {
                out.insert(chars[start..end].iter().collect());
            }
        }
    }
    out
}

/// Gram posting lists for one document field.
#[derive(Debug, Default)]
struct FieldIndex {
    postings: HashMap<String, HashSet<usize>>,
}

impl FieldIndex {
    fn insert(&mut self, doc: usize, text: &str) {
        for gram in grams(text) {
            self.postings.entry(gram).or_default().insert(doc);
        }
    }

    /// Documents containing every gram of `term`: the candidates for a
    /// substring match. Terms too short to produce a gram match nothing.
    fn matches(&self, term: &str) -> HashSet<usize> {
        let query = grams(term);
        if query.is_empty() {
            return HashSet::new();
        }
        let mut docs: Option<HashSet<usize>> = None;
        for gram in &query {
            let Some(postings) = self.postings.get(gram) else {
                return HashSet::new();
            };
            docs = Some(match docs {
                None => postings.clone(),
                Some(found) => found.intersection(postings).copied().collect(),
            });
        }
        docs.unwrap_or_default()
    }
}

/// Index for one compiler version: one document per package, holding the
/// newest release that supports that compiler.
#[derive(Debug, Default)]
struct CompilerIndex {
    packages: Vec<Package>,
    namespace: FieldIndex,
    name: FieldIndex,
}

impl CompilerIndex {
    fn build(infos: &[PackageInfo], compiler: Version) -> Self {
        let mut latest: HashMap<PackageName, &PackageInfo> = HashMap::new();
        for info in infos {
            let Some(constraint) = info.compiler_constraint else {
                continue;
            };
            if !constraint.is_satisfied(compiler) {
                continue;
            }
            latest
                .entry(info.package_name())
                .and_modify(|current| {
                    if info.version > current.version {
                        *current = info;
                    }
                })
                .or_insert(info);
        }

        let mut documents: Vec<&PackageInfo> = latest.into_values().collect();
        documents.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        let mut index = Self::default();
        for info in documents {
            let doc = index.packages.len();
            index.namespace.insert(doc, &info.namespace);
            index.name.insert(doc, &info.name);
            index.packages.push(info.to_package());
        }
        index
    }

    fn query(&self, raw_query: &str) -> Vec<Package> {
        let mut scores: HashMap<usize, f64> = HashMap::new();
        match raw_query.split_once('/') {
            // `namespace/`: namespace field only.
            Some((namespace, name)) if name.is_empty() => {
                for doc in self.namespace.matches(namespace) {
                    *scores.entry(doc).or_default() += NAMESPACE_BOOST;
                }
            }
            // `/name`: name field only.
            Some((namespace, name)) if namespace.is_empty() => {
                for doc in self.name.matches(name) {
                    *scores.entry(doc).or_default() += 1.0;
                }
            }
            // `namespace/name`: both fields must match.
            Some((namespace, name)) => {
                let by_namespace = self.namespace.matches(namespace);
                let by_name = self.name.matches(name);
                for doc in by_namespace.intersection(&by_name) {
                    scores.insert(*doc, NAMESPACE_BOOST + 1.0);
                }
            }
            // No separator: either field may match.
            None => {
                for doc in self.namespace.matches(raw_query) {
                    *scores.entry(doc).or_default() += NAMESPACE_BOOST;
                }
                for doc in self.name.matches(raw_query) {
                    *scores.entry(doc).or_default() += 1.0;
                }
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|(doc_a, score_a), (doc_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    let a = &self.packages[*doc_a];
                    let b = &self.packages[*doc_b];
                    (&a.name, a.version).cmp(&(&b.name, b.version))
                })
        });
        ranked
            .into_iter()
            .take(RESULT_LIMIT)
            .map(|(doc, _)| self.packages[doc].clone())
            .collect()
    }
}

/// Per-compiler-version fuzzy index over package identifiers.
///
/// Rebuilt wholesale alongside the compatibility cache and replaced, never
/// mutated in place.
#[derive(Debug, Default)]
pub struct SearchIndex {
    by_compiler: HashMap<Version, CompilerIndex>,
}

impl SearchIndex {
    pub fn build(infos: &[PackageInfo]) -> Self {
        let mut by_compiler = HashMap::new();
        for &compiler in SEARCHABLE_COMPILER_VERSIONS {
            by_compiler.insert(compiler, CompilerIndex::build(infos, compiler));
        }
        Self { by_compiler }
    }

    /// Runs `raw_query` against the index for `compiler`. Compiler versions
    /// without an index yield an empty result, not an error.
    pub fn query(&self, compiler: Version, raw_query: &str) -> Vec<Package> {
        let Some(index) = self.by_compiler.get(&compiler) else {
            return Vec::new();
        };
        index.query(raw_query)
    }
}
