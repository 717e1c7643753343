//! Ordered rule table mapping product text to a classification code

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::classification::codes::validate_code;
use crate::tax::gst::validate_rate;
use crate::types::*;

/// Product attribute a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Category,
    Type,
}

/// Case-insensitive predicate over a product's name, category and type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    Contains(Field, String),
    Equals(Field, String),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn evaluate(&self, item: &ItemText) -> bool {
        match self {
            Condition::Always => true,
            Condition::Contains(field, needle) => item.field(*field).contains(needle.as_str()),
            Condition::Equals(field, value) => item.field(*field) == value.as_str(),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(item)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(item)),
        }
    }

    fn lowercased(self) -> Self {
        match self {
            Condition::Always => Condition::Always,
            Condition::Contains(field, needle) => Condition::Contains(field, needle.to_lowercase()),
            Condition::Equals(field, value) => Condition::Equals(field, value.to_lowercase()),
            Condition::All(conditions) => {
                Condition::All(conditions.into_iter().map(Condition::lowercased).collect())
            }
            Condition::Any(conditions) => {
                Condition::Any(conditions.into_iter().map(Condition::lowercased).collect())
            }
        }
    }
}

/// Lower-cased product text; a missing attribute reads as the empty string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemText {
    name: String,
    category: String,
    product_type: String,
}

impl ItemText {
    pub fn new(category: Option<&str>, name: &str, product_type: Option<&str>) -> Self {
        Self {
            name: name.to_lowercase(),
            category: category.unwrap_or_default().to_lowercase(),
            product_type: product_type.unwrap_or_default().to_lowercase(),
        }
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Category => &self.category,
            Field::Type => &self.product_type,
        }
    }
}

/// Code and rate a rule resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub code: String,
    pub rate: BigDecimal,
    pub description: String,
}

/// Serialized rule: `entry` names a registry key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub when: Condition,
    pub entry: String,
}

/// Serialized registry, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub entries: Vec<RegistryEntry>,
    /// Evaluated in order; first match wins
    pub rules: Vec<RuleSpec>,
    /// Entry used when no rule matches
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    name: String,
    when: Condition,
    entry: RegistryEntry,
}

/// Result of classifying one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub key: String,
    pub code: String,
    pub rate: BigDecimal,
    pub description: String,
    /// Rule that matched, or `"fallback"`
    pub rule: String,
}

impl Classification {
    fn from_entry(entry: &RegistryEntry, rule: &str) -> Self {
        Self {
            key: entry.key.clone(),
            code: entry.code.clone(),
            rate: entry.rate.clone(),
            description: entry.description.clone(),
            rule: rule.to_string(),
        }
    }
}

/// Ordered classification rules over a set of registry entries
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRegistry {
    entries: Vec<RegistryEntry>,
    rules: Vec<Rule>,
    fallback: RegistryEntry,
}

impl CodeRegistry {
    /// Resolve rule references and validate every entry
    pub fn from_config(config: RegistryConfig) -> GstResult<Self> {
        let mut seen = HashSet::new();
        for entry in &config.entries {
            if !seen.insert(entry.key.as_str()) {
                return Err(GstError::Validation(format!(
                    "Registry entry '{}' is defined twice",
                    entry.key
                )));
            }
            if !validate_code(&entry.code, CodeKind::Hsn) && !validate_code(&entry.code, CodeKind::Sac)
            {
                return Err(GstError::Validation(format!(
                    "Registry entry '{}' has invalid code '{}'",
                    entry.key, entry.code
                )));
            }
            validate_rate(&entry.rate)?;
        }

        let lookup = |key: &str| {
            config
                .entries
                .iter()
                .find(|entry| entry.key == key)
                .cloned()
                .ok_or_else(|| GstError::Validation(format!("Unknown registry entry '{key}'")))
        };

        let rules = config
            .rules
            .iter()
            .map(|spec| {
                Ok(Rule {
                    name: spec.name.clone(),
                    when: spec.when.clone().lowercased(),
                    entry: lookup(&spec.entry)?,
                })
            })
            .collect::<GstResult<Vec<_>>>()?;
        let fallback = lookup(&config.fallback)?;

        Ok(Self {
            entries: config.entries,
            rules,
            fallback,
        })
    }

    pub fn from_json(json: &str) -> GstResult<Self> {
        let config: RegistryConfig = serde_json::from_str(json)
            .map_err(|e| GstError::Validation(format!("Invalid registry: {e}")))?;
        Self::from_config(config)
    }

    /// Classify a product; rules are tried in order and the first match wins
    pub fn classify(
        &self,
        category: Option<&str>,
        product_name: &str,
        product_type: Option<&str>,
    ) -> Classification {
        let item = ItemText::new(category, product_name, product_type);

        self.rules
            .iter()
            .find(|rule| rule.when.evaluate(&item))
            .map(|rule| Classification::from_entry(&rule.entry, &rule.name))
            .unwrap_or_else(|| Classification::from_entry(&self.fallback, "fallback"))
    }

    pub fn classify_product(&self, product: &Product) -> Classification {
        self.classify(
            product.category.as_deref(),
            &product.name,
            product.product_type.as_deref(),
        )
    }

    pub fn entry(&self, key: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Rule names in evaluation order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name.as_str()).collect()
    }

    /// One code-table row per distinct code; the first entry carrying a code describes it
    pub fn required_codes(&self, category: &str) -> Vec<NewTaxCode> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| seen.insert(entry.code.as_str()))
            .map(|entry| NewTaxCode {
                code: entry.code.clone(),
                description: entry.description.clone(),
                rate: entry.rate.clone(),
                kind: CodeKind::Hsn,
                category: category.to_string(),
            })
            .collect()
    }
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::beverages()
    }
}

fn entry(key: &str, code: &str, rate: u32, description: &str) -> RegistryEntry {
    RegistryEntry {
        key: key.to_string(),
        code: code.to_string(),
        rate: BigDecimal::from(rate),
        description: description.to_string(),
    }
}

fn rule(name: &str, when: Condition, entry: &str) -> RuleSpec {
    RuleSpec {
        name: name.to_string(),
        when,
        entry: entry.to_string(),
    }
}

fn contains(field: Field, needle: &str) -> Condition {
    Condition::Contains(field, needle.to_string())
}

fn equals(field: Field, value: &str) -> Condition {
    Condition::Equals(field, value.to_string())
}

/// Juice bar registry
pub fn beverage_config() -> RegistryConfig {
    use Field::*;

    let cane = Condition::Any(vec![contains(Name, "cane"), contains(Category, "cane")]);
    let herbal_type = equals(Type, "spiced/herbal/others");

    RegistryConfig {
        entries: vec![
            entry("fruit_juice", "2009", 12, "Fruit juices and vegetable juices"),
            entry("flavored_drinks", "2202", 18, "Waters, including mineral and aerated waters"),
            entry("natural_drinks", "2009", 12, "Natural fruit and vegetable juices"),
            entry("tropical", "2009", 12, "Tropical fruit juices"),
            entry("citrus", "2009", 12, "Citrus fruit juices"),
            entry("berries", "2009", 12, "Berry fruit juices"),
            entry("spiced_herbal", "2202", 18, "Flavored and spiced beverages"),
            entry("cane_juice", "2009", 12, "Sugar cane juice"),
            entry("plain_cane", "2009", 5, "Plain sugar cane juice (essential commodity)"),
            entry("flavored_cane", "2009", 12, "Flavored sugar cane juice"),
            entry("herbal_drinks", "2202", 18, "Herbal and medicinal drinks"),
        ],
        rules: vec![
            rule(
                "plain_house_cane",
                Condition::All(vec![contains(Name, "justcane"), contains(Name, "plain")]),
                "plain_cane",
            ),
            rule(
                "plain_cane",
                Condition::All(vec![
                    cane.clone(),
                    Condition::Any(vec![contains(Name, "plain"), contains(Type, "plain")]),
                ]),
                "plain_cane",
            ),
            rule("flavored_cane", cane, "flavored_cane"),
            rule("tropical", equals(Type, "tropical"), "tropical"),
            rule("citrus", equals(Type, "citrus"), "citrus"),
            rule("berries", equals(Type, "berries"), "berries"),
            rule(
                "herbal_by_name",
                Condition::All(vec![
                    herbal_type.clone(),
                    Condition::Any(vec![
                        contains(Name, "jaljeera"),
                        contains(Name, "ginger"),
                        contains(Name, "mint"),
                        contains(Name, "herbal"),
                    ]),
                ]),
                "herbal_drinks",
            ),
            rule("spiced_herbal", herbal_type, "spiced_herbal"),
        ],
        fallback: "fruit_juice".to_string(),
    }
}

static BEVERAGES: Lazy<CodeRegistry> = Lazy::new(|| {
    CodeRegistry::from_config(beverage_config()).expect("Invalid built-in beverage registry")
});

impl CodeRegistry {
    /// Built-in juice bar registry
    pub fn beverages() -> Self {
        BEVERAGES.clone()
    }
}
