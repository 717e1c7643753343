//! Inventory analysis: suggest codes for products from their text

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::classification::registry::CodeRegistry;
use crate::traits::*;
use crate::types::*;
use crate::utils::progress::BatchControl;

const MAX_SEARCH_TERMS: usize = 8;
const MAX_DESCRIPTION_TERMS: usize = 3;
const MAX_SUGGESTIONS: usize = 5;

const BASE_CONFIDENCE: i32 = 50;
const CATEGORY_BONUS: i32 = 20;
const WORD_MATCH_BONUS: i32 = 10;
const WORD_MATCH_CAP: i32 = 30;
const GENERIC_TERM_PENALTY: i32 = 15;

pub const HIGH_CONFIDENCE: u8 = 80;
pub const MEDIUM_CONFIDENCE: u8 = 60;

const GENERIC_TERMS: [&str; 3] = ["item", "product", "goods"];

const STOP_WORDS: [&str; 52] = [
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "up",
    "about", "into", "through", "during", "before", "after", "above", "below", "between", "among",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "may", "might", "must", "can", "shall", "this", "that",
    "these", "those", "a", "an",
];

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("Invalid word filter regex"));

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// A code the catalog can suggest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub description: String,
    pub rate: Option<BigDecimal>,
    pub category: Option<String>,
}

/// Catalog over the persisted code table and the registry's entries
#[derive(Debug, Clone, Default)]
pub struct CodeTableCatalog {
    entries: Vec<CatalogEntry>,
}

impl CodeTableCatalog {
    pub fn new(codes: &[TaxCode], registry: &CodeRegistry) -> Self {
        let table = codes.iter().map(|code| CatalogEntry {
            code: code.code.clone(),
            description: code.description.clone(),
            rate: Some(code.rate.clone()),
            category: Some(code.category.clone()),
        });
        let rules = registry.entries().iter().map(|entry| CatalogEntry {
            code: entry.code.clone(),
            description: entry.description.clone(),
            rate: Some(entry.rate.clone()),
            category: Some(entry.key.replace('_', " ")),
        });

        Self {
            entries: table.chain(rules).collect(),
        }
    }
}

impl HsnCatalog for CodeTableCatalog {
    fn search(&self, term: &str) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.description.to_lowercase().contains(term)
                    || entry
                        .category
                        .as_deref()
                        .is_some_and(|category| category.to_lowercase().contains(term))
            })
            .cloned()
            .collect()
    }
}

fn words(text: &str) -> Vec<String> {
    NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Search terms for a product, at most eight, in priority order
pub fn extract_search_terms(
    name: &str,
    category: Option<&str>,
    description: Option<&str>,
    subcategory: Option<&str>,
) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: String| {
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    };

    let category = category.filter(|c| !c.trim().is_empty());
    if let Some(category) = category {
        push(category.trim().to_lowercase());
    }
    if let Some(subcategory) = subcategory {
        push(subcategory.trim().to_lowercase());
    }

    let name_words: Vec<String> = words(name)
        .into_iter()
        .filter(|word| word.len() > 2 && !is_stop_word(word))
        .collect();
    for word in &name_words {
        push(word.clone());
    }

    if let Some(description) = description {
        words(description)
            .into_iter()
            .filter(|word| word.len() > 3 && !is_stop_word(word))
            .take(MAX_DESCRIPTION_TERMS)
            .for_each(&mut push);
    }

    if let (Some(category), Some(first)) = (category, name_words.first()) {
        push(format!("{} {first}", category.to_lowercase()));
    }

    terms.truncate(MAX_SEARCH_TERMS);
    terms
}

/// Confidence (0-100) that `entry`, found through `term`, fits the product
pub fn calculate_confidence(
    term: &str,
    entry: &CatalogEntry,
    product_name: &str,
    category: Option<&str>,
) -> u8 {
    let term = term.to_lowercase();
    let mut confidence = BASE_CONFIDENCE;

    if let Some(category) = category.filter(|c| !c.is_empty()) {
        if term.contains(&category.to_lowercase()) {
            confidence += CATEGORY_BONUS;
        }
    }

    let description = entry.description.to_lowercase();
    let code_words: Vec<&str> = description.split_whitespace().collect();
    let name = product_name.to_lowercase();
    let matching = name
        .split_whitespace()
        .filter(|word| {
            code_words
                .iter()
                .any(|code_word| code_word.contains(word) || word.contains(code_word))
        })
        .count() as i32;
    confidence += (matching * WORD_MATCH_BONUS).min(WORD_MATCH_CAP);

    if GENERIC_TERMS.contains(&term.as_str()) {
        confidence -= GENERIC_TERM_PENALTY;
    }

    confidence.clamp(0, 100) as u8
}

/// One suggested code for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub code: String,
    pub description: String,
    pub rate: Option<BigDecimal>,
    pub search_term: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_id: String,
    pub product_name: String,
    /// Best first, at most five, one per code
    pub suggestions: Vec<Suggestion>,
}

impl ProductAnalysis {
    pub fn recommended(&self) -> Option<&Suggestion> {
        self.suggestions.first()
    }
}

/// Suggest codes for one product
pub fn analyze_product(catalog: &dyn HsnCatalog, product: &Product) -> ProductAnalysis {
    let category = product.category.as_deref();
    let terms = extract_search_terms(&product.name, category, None, product.product_type.as_deref());

    let mut seen = HashSet::new();
    let mut suggestions: Vec<Suggestion> = terms
        .iter()
        .flat_map(|term| {
            catalog.search(term).into_iter().map(move |entry| (term, entry))
        })
        .filter(|(_, entry)| seen.insert(entry.code.clone()))
        .map(|(term, entry)| Suggestion {
            confidence: calculate_confidence(term, &entry, &product.name, category),
            code: entry.code,
            description: entry.description,
            rate: entry.rate,
            search_term: term.clone(),
        })
        .collect();

    suggestions.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    suggestions.truncate(MAX_SUGGESTIONS);

    ProductAnalysis {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        suggestions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_products: usize,
    pub with_suggestions: usize,
    pub without_suggestions: usize,
    /// Recommended suggestion at 80 or above
    pub high_confidence: usize,
    /// Recommended suggestion from 60 to 79
    pub medium_confidence: usize,
    /// Recommended suggestion from 1 to 59
    pub low_confidence: usize,
}

impl AnalysisSummary {
    pub fn from_analyses(analyses: &[ProductAnalysis]) -> Self {
        let mut summary = Self {
            total_products: analyses.len(),
            ..Self::default()
        };

        for analysis in analyses {
            match analysis.recommended().map(|s| s.confidence) {
                None => summary.without_suggestions += 1,
                Some(confidence) => {
                    summary.with_suggestions += 1;
                    if confidence >= HIGH_CONFIDENCE {
                        summary.high_confidence += 1;
                    } else if confidence >= MEDIUM_CONFIDENCE {
                        summary.medium_confidence += 1;
                    } else if confidence > 0 {
                        summary.low_confidence += 1;
                    }
                }
            }
        }

        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: AnalysisSummary,
    pub analyses: Vec<ProductAnalysis>,
    /// The run stopped early; only visited products are included
    pub cancelled: bool,
    pub generated_at: NaiveDateTime,
}

/// Runs code suggestions over the whole inventory
pub struct InventoryAnalyzer<S: GstStore> {
    storage: S,
    registry: CodeRegistry,
    catalog: Option<Box<dyn HsnCatalog>>,
}

impl<S: GstStore> InventoryAnalyzer<S> {
    /// Analyzer searching the code table and the registry
    pub fn new(storage: S, registry: CodeRegistry) -> Self {
        Self {
            storage,
            registry,
            catalog: None,
        }
    }

    /// Analyzer searching a caller-supplied catalog instead
    pub fn with_catalog(storage: S, registry: CodeRegistry, catalog: Box<dyn HsnCatalog>) -> Self {
        Self {
            storage,
            registry,
            catalog: Some(catalog),
        }
    }

    /// Analyze every product, ordered by name
    pub async fn generate_report(&self, control: &BatchControl) -> GstResult<AnalysisReport> {
        let products = self
            .storage
            .list_products()
            .await
            .map_err(|e| GstError::persistence("list products", e))?;

        let table_catalog;
        let catalog: &dyn HsnCatalog = match &self.catalog {
            Some(catalog) => &**catalog,
            None => {
                let codes = self
                    .storage
                    .list_tax_codes()
                    .await
                    .map_err(|e| GstError::persistence("list tax codes", e))?;
                table_catalog = CodeTableCatalog::new(&codes, &self.registry);
                &table_catalog
            }
        };

        let total = products.len();
        let mut analyses = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, product) in products.iter().enumerate() {
            if control.is_cancelled() {
                warn!(done = index, total, "inventory analysis cancelled");
                cancelled = true;
                break;
            }
            analyses.push(analyze_product(catalog, product));
            control.report("analyze_inventory", index + 1, total, Some(&product.name));
        }

        let summary = AnalysisSummary::from_analyses(&analyses);
        info!(
            products = summary.total_products,
            high = summary.high_confidence,
            medium = summary.medium_confidence,
            low = summary.low_confidence,
            "inventory analysis finished"
        );

        Ok(AnalysisReport {
            summary,
            analyses,
            cancelled,
            generated_at: chrono::Utc::now().naive_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_entry(code: &str, description: &str) -> CatalogEntry {
        CatalogEntry {
            code: code.to_string(),
            description: description.to_string(),
            rate: Some(BigDecimal::from(12)),
            category: None,
        }
    }

    #[test]
    fn test_search_terms() {
        let terms = extract_search_terms(
            "The Mango & Mint Cooler",
            Some("Juices"),
            Some("Fresh pulp blended with crushed ice and mint leaves"),
            Some("tropical"),
        );

        assert_eq!(
            terms,
            vec![
                "juices",
                "tropical",
                "mango",
                "mint",
                "cooler",
                "fresh",
                "pulp",
                "blended",
            ]
        );
    }

    #[test]
    fn test_search_terms_compound_and_short_words() {
        let terms = extract_search_terms("Ice Tea Lemon", Some("Drinks"), None, None);
        // "ice" and "tea" are three letters and kept; nothing shorter survives
        assert_eq!(terms, vec!["drinks", "ice", "tea", "lemon", "drinks ice"]);

        let terms = extract_search_terms("OJ", None, None, None);
        assert!(terms.is_empty());
    }

    #[test]
    fn test_confidence_scoring() {
        let entry = catalog_entry("2009", "Tropical fruit juices");

        // base 50 + category 20 + "tropical" matches once (10)
        assert_eq!(
            calculate_confidence("tropical", &entry, "Tropical Punch", Some("tropical")),
            80
        );
        // word matches are capped at 30
        assert_eq!(
            calculate_confidence("x", &entry, "tropical fruit juices juice", None),
            80
        );
        // generic term penalty
        assert_eq!(calculate_confidence("goods", &entry, "Soda", None), 35);
    }

    #[test]
    fn test_analyze_product_dedupes_and_ranks() {
        let catalog = CodeTableCatalog::new(&[], &CodeRegistry::beverages());
        let product = Product::new(
            "p1".to_string(),
            "Mango Cooler".to_string(),
            Some("tropical".to_string()),
            Some("tropical".to_string()),
        );

        let analysis = analyze_product(&catalog, &product);

        let recommended = analysis.recommended().unwrap();
        assert_eq!(recommended.code, "2009");
        assert_eq!(recommended.search_term, "tropical");
        assert_eq!(recommended.confidence, 70);

        let codes: Vec<&str> = analysis.suggestions.iter().map(|s| s.code.as_str()).collect();
        let unique: HashSet<&str> = codes.iter().copied().collect();
        assert_eq!(codes.len(), unique.len());
        assert!(analysis.suggestions.len() <= MAX_SUGGESTIONS);
    }

    #[test]
    fn test_summary_bands() {
        let analysis = |confidence: Option<u8>| ProductAnalysis {
            product_id: "p".to_string(),
            product_name: "p".to_string(),
            suggestions: confidence
                .map(|confidence| Suggestion {
                    code: "2009".to_string(),
                    description: String::new(),
                    rate: None,
                    search_term: String::new(),
                    confidence,
                })
                .into_iter()
                .collect(),
        };

        let summary = AnalysisSummary::from_analyses(&[
            analysis(Some(85)),
            analysis(Some(80)),
            analysis(Some(60)),
            analysis(Some(59)),
            analysis(None),
        ]);

        assert_eq!(summary.total_products, 5);
        assert_eq!(summary.with_suggestions, 4);
        assert_eq!(summary.without_suggestions, 1);
        assert_eq!(summary.high_confidence, 2);
        assert_eq!(summary.medium_confidence, 1);
        assert_eq!(summary.low_confidence, 1);
    }
}
