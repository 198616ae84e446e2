//! Report generator: per-item explanations plus aggregate statistics.
//!
//! Runs after every eviction of a pass is final. Entries follow ingestion
//! order, one per ingested item. Explanations are derived from the stored
//! facts compared against the schema's values, never by re-evaluating
//! formulas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::checker::CheckOutcome;
use crate::schema::{Category, Schema};
use crate::store::AssertionStore;
use crate::types::{EvictionReason, Facts, ItemId, Verdict};

/// Errors from building a report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Cannot compute statistics over an empty batch")]
    EmptyBatch,

    #[error("{inconsistent} inconsistent items out of only {total}")]
    CountMismatch { inconsistent: usize, total: usize },

    #[error("Failed to serialize report: {0}")]
    Serialize(String),
}

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

/// Input for one report entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub item_id: ItemId,
    pub verdict: Verdict,
    pub category: Option<Category>,
    /// `None` when the item is no longer in the store
    pub facts: Option<Facts>,
}

impl ReportItem {
    /// Consistent and still in the store. A consistent verdict for an item
    /// that has since been removed does not count.
    pub fn is_retained(&self) -> bool {
        self.verdict.is_consistent() && self.facts.is_some()
    }

    /// Pair every verdict of a pass with the item's current state in `store`.
    pub fn collect(outcome: &CheckOutcome, store: &AssertionStore) -> Vec<ReportItem> {
        outcome
            .verdicts()
            .iter()
            .map(|v| {
                let item = store.item(&v.item_id);
                ReportItem {
                    item_id: v.item_id.clone(),
                    verdict: v.verdict.clone(),
                    category: item.and_then(|i| i.category()).or(v.category),
                    facts: item.map(|i| i.facts().clone()),
                }
            })
            .collect()
    }
}

/// Aggregate counts of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_items: usize,
    pub inconsistent_items: usize,
    pub consistent_items: usize,
    /// Rounded to two decimal places
    pub inconsistent_percentage: f64,
    /// Rounded to two decimal places
    pub consistent_percentage: f64,
}

impl Summary {
    /// Compute the summary. Fails on an empty batch instead of dividing by
    /// zero, and on more inconsistent items than items.
    pub fn from_counts(total_items: usize, inconsistent_items: usize) -> Result<Self, ReportError> {
        if total_items == 0 {
            return Err(ReportError::EmptyBatch);
        }
        if inconsistent_items > total_items {
            return Err(ReportError::CountMismatch {
                inconsistent: inconsistent_items,
                total: total_items,
            });
        }

        let consistent_items = total_items - inconsistent_items;
        let percent = |count: usize| round2(count as f64 / total_items as f64 * 100.0);

        Ok(Self {
            total_items,
            inconsistent_items,
            consistent_items,
            inconsistent_percentage: percent(inconsistent_items),
            consistent_percentage: percent(consistent_items),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One rendered explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub item_id: ItemId,
    pub consistent: bool,
    pub text: String,
}

/// The result of one full pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    summary: Summary,
    entries: Vec<ReportEntry>,
    evicted: Vec<ItemId>,
}

impl Report {
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Ids excluded from downstream use, in ingestion order.
    pub fn evicted_ids(&self) -> &[ItemId] {
        &self.evicted
    }

    /// Plain text: the summary block, then one blank-line separated entry
    /// per item.
    pub fn to_text(&self) -> String {
        let s = &self.summary;
        let mut out = format!(
            "Summary:\nTotal Items: {}\nInconsistent Items: {} ({:.2}%)\nConsistent Items: {} ({:.2}%)\n",
            s.total_items,
            s.inconsistent_items,
            s.inconsistent_percentage,
            s.consistent_items,
            s.consistent_percentage
        );
        for entry in &self.entries {
            out.push('\n');
            out.push_str(&entry.text);
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self).map_err(|e| ReportError::Serialize(e.to_string()))
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => self.to_json(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Builds reports against one schema.
pub struct ReportGenerator<'s> {
    schema: &'s Schema,
}

impl<'s> ReportGenerator<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    /// Build the report for items in their given order.
    pub fn generate(&self, items: &[ReportItem]) -> Result<Report, ReportError> {
        let inconsistent = items.iter().filter(|i| !i.is_retained()).count();
        let summary = Summary::from_counts(items.len(), inconsistent)?;

        let entries = items
            .iter()
            .map(|item| ReportEntry {
                item_id: item.item_id.clone(),
                consistent: item.is_retained(),
                text: self.explain(item),
            })
            .collect();

        let evicted = items
            .iter()
            .filter(|i| !i.is_retained())
            .map(|i| i.item_id.clone())
            .collect();

        Ok(Report {
            summary,
            entries,
            evicted,
        })
    }

    /// Build the report for a finished pass.
    pub fn from_pass(
        &self,
        outcome: &CheckOutcome,
        store: &AssertionStore,
    ) -> Result<Report, ReportError> {
        self.generate(&ReportItem::collect(outcome, store))
    }

    fn explain(&self, item: &ReportItem) -> String {
        match &item.facts {
            None => explain_absent(&item.item_id, item.verdict.reason()),
            Some(facts) => self.explain_present(item, facts),
        }
    }

    fn explain_present(&self, item: &ReportItem, facts: &Facts) -> String {
        let mut text = match item.category {
            Some(category) => format!("{} is a {}", item.item_id, category),
            None => format!("{} has no category", item.item_id),
        };

        if item.verdict.is_consistent() {
            text.push_str(" and is consistent");
        } else {
            text.push_str(" and is NOT consistent, hence removed");
        }

        let clauses: Vec<String> = self
            .schema
            .all_values()
            .map(|(axis, value)| {
                if facts.has(axis, value) {
                    format!("has {} in {}", value, axis)
                } else {
                    format!("does not have {} in {}", value, axis)
                }
            })
            .collect();

        if clauses.is_empty() {
            text.push('.');
        } else {
            text.push_str(". It ");
            text.push_str(&clauses.join(", "));
            text.push('.');
        }
        text
    }
}

fn explain_absent(item_id: &ItemId, reason: Option<&EvictionReason>) -> String {
    let cause = match reason {
        Some(EvictionReason::UnknownCategory { name }) => {
            format!("It was removed because its category '{}' is unknown.", name)
        }
        Some(EvictionReason::UnknownAttribute { axis, value }) => {
            format!("It was removed because attribute {}={} is unknown.", axis, value)
        }
        Some(EvictionReason::Unclassified) => {
            "It was removed because no category was predicted.".to_string()
        }
        _ => "It may have been removed due to inconsistency.".to_string(),
    };
    format!("{} could not be found in the knowledge base. {}", item_id, cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ConsistencyChecker;
    use crate::schema::{AttributeValue::*, Axis};

    fn four_item_pass() -> (AssertionStore, CheckOutcome) {
        let schema = Schema::standard().unwrap();
        let mut store = AssertionStore::new();
        let shirt = [
            (Axis::BodyPart, TopPart),
            (Axis::WeatherType, Any),
            (Axis::EdgeShape, CurveEdge),
        ];
        store.ingest("a", Some(Category::Shirt), &shirt).unwrap();
        store.ingest("b", Some(Category::Shirt), &shirt).unwrap();
        store.ingest("c", Some(Category::Dress), &shirt).unwrap();
        store.ingest("d", Some(Category::Shirt), &shirt).unwrap();

        let outcome = ConsistencyChecker::new(schema).check(&mut store);
        (store, outcome)
    }

    #[test]
    fn test_statistics_scenario() {
        let (store, outcome) = four_item_pass();
        let report = ReportGenerator::new(Schema::standard().unwrap())
            .from_pass(&outcome, &store)
            .unwrap();

        let text = report.to_text();
        assert!(text.starts_with("Summary:\nTotal Items: 4\n"));
        assert!(text.contains("Inconsistent Items: 1 (25.00%)"));
        assert!(text.contains("Consistent Items: 3 (75.00%)"));
        assert_eq!(report.entries().len(), 4);
        assert_eq!(report.evicted_ids(), &[ItemId::from("c")]);
    }

    #[test]
    fn test_entries_follow_ingestion_order() {
        let (store, outcome) = four_item_pass();
        let report = ReportGenerator::new(Schema::standard().unwrap())
            .from_pass(&outcome, &store)
            .unwrap();

        let ids: Vec<&str> = report.entries().iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_present_item_explanation() {
        let (store, outcome) = four_item_pass();
        let report = ReportGenerator::new(Schema::standard().unwrap())
            .from_pass(&outcome, &store)
            .unwrap();

        let text = &report.entries()[0].text;
        assert!(text.starts_with("a is a Shirt and is consistent. It does not have WholeBody in BodyPart, has TopPart in BodyPart,"));
        assert!(text.ends_with("does not have StraightEdge in EdgeShape, has CurveEdge in EdgeShape."));
        assert_eq!(text.matches("does not have").count(), 7);
    }

    #[test]
    fn test_evicted_item_explanation() {
        let (store, outcome) = four_item_pass();
        let report = ReportGenerator::new(Schema::standard().unwrap())
            .from_pass(&outcome, &store)
            .unwrap();

        assert_eq!(
            report.entries()[2].text,
            "c could not be found in the knowledge base. It may have been removed due to inconsistency."
        );
        assert!(!report.entries()[2].consistent);
    }

    #[test]
    fn test_unknown_category_explanation() {
        let text = explain_absent(
            &"x".into(),
            Some(&EvictionReason::UnknownCategory {
                name: "Hat".to_string(),
            }),
        );
        assert_eq!(
            text,
            "x could not be found in the knowledge base. It was removed because its category 'Hat' is unknown."
        );
    }

    #[test]
    fn test_present_but_evicted_verdict() {
        let schema = Schema::standard().unwrap();
        let item = ReportItem {
            item_id: "z".into(),
            verdict: Verdict::evicted(EvictionReason::Absent),
            category: Some(Category::Bag),
            facts: Some(Facts::new()),
        };
        let report = ReportGenerator::new(schema).generate(&[item]).unwrap();
        assert!(report.entries()[0]
            .text
            .starts_with("z is a Bag and is NOT consistent, hence removed. It does not have"));
    }

    #[test]
    fn test_empty_batch_fails_fast() {
        let schema = Schema::standard().unwrap();
        let result = ReportGenerator::new(schema).generate(&[]);
        assert_eq!(result.unwrap_err(), ReportError::EmptyBatch);
    }

    #[test]
    fn test_text_layout() {
        let schema = Schema::standard().unwrap();
        let mut store = AssertionStore::new();
        store
            .ingest(
                "a",
                Some(Category::Bag),
                &[
                    (Axis::BodyPart, Hands),
                    (Axis::WeatherType, Any),
                    (Axis::EdgeShape, StraightEdge),
                ],
            )
            .unwrap();
        store
            .ingest("b", Some(Category::Bag), &[(Axis::BodyPart, Feet)])
            .unwrap();

        let outcome = ConsistencyChecker::new(schema).check(&mut store);
        let report = ReportGenerator::new(schema).from_pass(&outcome, &store).unwrap();

        let expected = "Summary:\n\
            Total Items: 2\n\
            Inconsistent Items: 1 (50.00%)\n\
            Consistent Items: 1 (50.00%)\n\
            \n\
            a is a Bag and is consistent. It does not have WholeBody in BodyPart, \
            does not have TopPart in BodyPart, does not have BottomPart in BodyPart, \
            does not have Feet in BodyPart, has Hands in BodyPart, \
            does not have Cold in WeatherType, does not have Warm in WeatherType, \
            has Any in WeatherType, has StraightEdge in EdgeShape, \
            does not have CurveEdge in EdgeShape.\n\
            \n\
            b could not be found in the knowledge base. \
            It may have been removed due to inconsistency.\n";
        assert_eq!(report.to_text(), expected);
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_consistent_verdict_without_facts_is_not_counted() {
        let schema = Schema::standard().unwrap();
        let item = ReportItem {
            item_id: "gone".into(),
            verdict: Verdict::Consistent,
            category: Some(Category::Bag),
            facts: None,
        };
        let report = ReportGenerator::new(schema).generate(&[item]).unwrap();

        assert!(!report.entries()[0].consistent);
        assert_eq!(report.summary().consistent_items, 0);
        assert_eq!(report.summary().inconsistent_items, 1);
        assert_eq!(report.evicted_ids(), &[ItemId::from("gone")]);
    }

    #[test]
    fn test_more_inconsistent_than_total_fails() {
        assert_eq!(
            Summary::from_counts(2, 3).unwrap_err(),
            ReportError::CountMismatch {
                inconsistent: 3,
                total: 2
            }
        );
    }

    #[test]
    fn test_percentages_round_to_two_places() {
        let summary = Summary::from_counts(3, 1).unwrap();
        assert_eq!(summary.inconsistent_percentage, 33.33);
        assert_eq!(summary.consistent_percentage, 66.67);
    }

    #[test]
    fn test_json_rendering() {
        let (store, outcome) = four_item_pass();
        let report = ReportGenerator::new(Schema::standard().unwrap())
            .from_pass(&outcome, &store)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&report.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(value["summary"]["total_items"], 4);
        assert_eq!(value["entries"].as_array().unwrap().len(), 4);
        assert_eq!(value["evicted"][0], "c");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
