//! Query results as returned by the archive, and the caller-facing
//! [`QueryResponse`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Panel, Style},
};

use crate::error::Error;
use crate::time::TIMEFORMAT;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end:   String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordExtent {
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// One matched data item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fileid:     String,
    #[serde(default)]
    pub provider:   String,
    /// Size in kB; providers report `-1` when unknown.
    #[serde(default)]
    pub size:       f64,
    #[serde(default)]
    pub time:       TimeSpan,
    #[serde(default)]
    pub source:     String,
    #[serde(default)]
    pub instrument: String,
    #[serde(default)]
    pub extent:     RecordExtent,
    #[serde(default)]
    pub physobj:    String,
    #[serde(default)]
    pub info:       Option<String>,
}

impl Record {
    fn parse(value: &str) -> Option<NaiveDateTime> { NaiveDateTime::parse_from_str(value, TIMEFORMAT).ok() }

    pub fn start(&self) -> Option<NaiveDateTime> { Self::parse(&self.time.start) }

    pub fn end(&self) -> Option<NaiveDateTime> { Self::parse(&self.time.end) }
}

/// Records from one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderItem {
    pub provider:               String,
    #[serde(default)]
    pub no_of_records_found:    i64,
    #[serde(default)]
    pub no_of_records_returned: i64,
    /// `None` when the provider answered without records, usually with an
    /// error message.
    #[serde(default)]
    pub record:                 Option<Vec<Record>>,
    #[serde(default)]
    pub error:                  Option<String>,
}

/// Raw answer to one query block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub provideritem: Vec<ProviderItem>,
}

impl QueryResult {
    /// Combine the answers to several blocks.
    ///
    /// The first item with records seen for a provider becomes the canonical
    /// one. Later items from that provider contribute only records whose file
    /// id has not been seen yet, bumping the found/returned counters for each.
    /// Items without records are kept as they are so their errors survive.
    pub fn merge(mut results: Vec<QueryResult>) -> QueryResult {
        if results.len() == 1 {
            if let Some(only) = results.pop() {
                return only;
            }
        }

        let mut fileids: HashSet<String> = HashSet::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut providers: Vec<ProviderItem> = Vec::new();

        for item in results.into_iter().flat_map(|r| r.provideritem) {
            let answered = item.record.as_ref().is_some_and(|records| !records.is_empty());
            match index.get(&item.provider) {
                None if !answered => providers.push(item),
                None => {
                    fileids.extend(item.record.iter().flatten().map(|r| r.fileid.clone()));
                    index.insert(item.provider.clone(), providers.len());
                    providers.push(item);
                }
                Some(&at) => {
                    let canonical = &mut providers[at];
                    for record in item.record.into_iter().flatten() {
                        if fileids.insert(record.fileid.clone()) {
                            canonical.record.get_or_insert_with(Vec::new).push(record);
                            canonical.no_of_records_found += 1;
                            canonical.no_of_records_returned += 1;
                        }
                    }
                }
            }
        }

        QueryResult { provideritem: providers }
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.provideritem
            .iter()
            .flat_map(|item| item.record.iter().flatten())
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Start time")]
    start:      String,
    #[tabled(rename = "End time")]
    end:        String,
    #[tabled(rename = "Source")]
    source:     String,
    #[tabled(rename = "Instrument")]
    instrument: String,
    #[tabled(rename = "Type")]
    kind:       String,
}

impl From<&Record> for Row {
    fn from(record: &Record) -> Self {
        let show = |parsed: Option<NaiveDateTime>, raw: &str| {
            parsed.map_or_else(|| raw.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        };
        Self {
            start:      show(record.start(), &record.time.start),
            end:        show(record.end(), &record.time.end),
            source:     record.source.clone(),
            instrument: record.instrument.clone(),
            kind:       record.extent.kind.clone(),
        }
    }
}

/// Matched records plus the non-fatal errors met while producing them.
#[derive(Debug, Default)]
pub struct QueryResponse {
    records:   Vec<Record>,
    /// Provider items that came back without records.
    unanswered: Vec<ProviderItem>,
    errors:    Vec<Error>,
}

impl QueryResponse {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn from_result(result: QueryResult) -> Self {
        let mut response = Self::default();
        for item in result.provideritem {
            match item.record {
                Some(records) if !records.is_empty() => response.records.extend(records),
                _ => response.unanswered.push(item),
            }
        }
        response
    }

    pub fn records(&self) -> &[Record] { &self.records }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> { self.records.iter() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn num_records(&self) -> usize { self.len() }

    /// Total size in kB. Unknown sizes (`<= 0`) are left out, so this may
    /// undercount.
    pub fn total_size(&self) -> f64 { self.records.iter().map(|r| r.size).filter(|s| *s > 0.0).sum() }

    /// Earliest start and latest end over all records with parseable times.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.records.iter().filter_map(Record::start).min()?;
        let end = self.records.iter().filter_map(Record::end).max()?;
        Some((start, end))
    }

    pub fn errors(&self) -> &[Error] { &self.errors }

    pub fn add_error(&mut self, error: Error) { self.errors.push(error); }

    pub fn take_errors(&mut self) -> Vec<Error> { std::mem::take(&mut self.errors) }

    /// Providers that answered without records, with their messages.
    pub fn provider_errors(&self) -> &[ProviderItem] { &self.unanswered }

    pub fn by_provider(&self) -> BTreeMap<&str, Vec<&Record>> {
        let mut map: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in &self.records {
            map.entry(record.provider.as_str()).or_default().push(record);
        }
        map
    }

    pub fn by_fileid(&self) -> HashMap<&str, &Record> {
        self.records
            .iter()
            .map(|record| (record.fileid.as_str(), record))
            .collect()
    }

    /// Subset of the records, e.g. to download only part of a result.
    pub fn select<F>(&self, mut keep: F) -> QueryResponse
    where
        F: FnMut(&Record) -> bool,
    {
        QueryResponse::new(self.records.iter().filter(|r| keep(r)).cloned().collect())
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(self.records.iter().map(Row::from));
        if !self.errors.is_empty() {
            table.with(Panel::footer(format!("{} error(s) while querying", self.errors.len())));
        }
        table.with(Style::blank());
        table
    }
}

impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.table()) }
}

impl FromIterator<Record> for QueryResponse {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self { Self::new(iter.into_iter().collect()) }
}

impl<'a> IntoIterator for &'a QueryResponse {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter { self.records.iter() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fileid: &str, provider: &str, size: f64, start: &str, end: &str) -> Record {
        Record {
            fileid: fileid.into(),
            provider: provider.into(),
            size,
            time: TimeSpan {
                start: start.into(),
                end:   end.into(),
            },
            source: "SOHO".into(),
            instrument: "EIT".into(),
            extent: RecordExtent { kind: "FULLDISK".into() },
            ..Record::default()
        }
    }

    fn result(provider: &str, records: Vec<Record>) -> QueryResult {
        QueryResult {
            provideritem: vec![ProviderItem {
                provider: provider.into(),
                no_of_records_found: records.len() as i64,
                no_of_records_returned: records.len() as i64,
                record: Some(records),
                error: None,
            }],
        }
    }

    #[test]
    fn test_merge_single_is_identity() {
        let one = result("SDAC", vec![record("a", "SDAC", 1.0, "", "")]);
        assert_eq!(QueryResult::merge(vec![one.clone()]), one);
    }

    #[test]
    fn test_merge_twice_dedupes() {
        let one = result("SDAC", vec![record("a", "SDAC", 1.0, "", ""), record("b", "SDAC", 1.0, "", "")]);
        let merged = QueryResult::merge(vec![one.clone(), one.clone()]);
        assert_eq!(merged, one);
    }

    #[test]
    fn test_merge_appends_new_records_and_counts() {
        let first = result("SDAC", vec![record("a", "SDAC", 1.0, "", "")]);
        let second = result("SDAC", vec![record("a", "SDAC", 1.0, "", ""), record("c", "SDAC", 1.0, "", "")]);
        let third = result("NSO", vec![record("n", "NSO", 1.0, "", "")]);
        let merged = QueryResult::merge(vec![first, second, third]);

        assert_eq!(merged.provideritem.len(), 2);
        let sdac = &merged.provideritem[0];
        assert_eq!(sdac.no_of_records_found, 2);
        assert_eq!(sdac.no_of_records_returned, 2);
        let ids: Vec<_> = merged.records().map(|r| r.fileid.as_str()).collect();
        assert_eq!(ids, ["a", "c", "n"]);
    }

    #[test]
    fn test_merge_keeps_provider_without_records() {
        let silent = QueryResult {
            provideritem: vec![ProviderItem {
                provider: "MSU".into(),
                error: Some("down".into()),
                ..ProviderItem::default()
            }],
        };
        let merged = QueryResult::merge(vec![silent, result("SDAC", vec![record("a", "SDAC", 1.0, "", "")])]);
        let response = QueryResponse::from_result(merged);
        assert_eq!(response.len(), 1);
        assert_eq!(response.provider_errors()[0].error.as_deref(), Some("down"));
    }

    #[test]
    fn test_merge_keeps_error_when_provider_answers_later() {
        let failed = QueryResult {
            provideritem: vec![ProviderItem {
                provider: "SDAC".into(),
                error: Some("timeout".into()),
                ..ProviderItem::default()
            }],
        };
        let later = result("SDAC", vec![record("a", "SDAC", 1.0, "", ""), record("b", "SDAC", 1.0, "", "")]);
        let merged = QueryResult::merge(vec![failed, later.clone(), later]);

        let response = QueryResponse::from_result(merged);
        assert_eq!(response.len(), 2);
        let errors: Vec<_> = response
            .provider_errors()
            .iter()
            .map(|item| (item.provider.as_str(), item.error.as_deref()))
            .collect();
        assert_eq!(errors, [("SDAC", Some("timeout"))]);
    }

    #[test]
    fn test_summaries() {
        let response: QueryResponse = [
            record("a", "SDAC", 10.0, "20100101000000", "20100101010000"),
            record("b", "SDAC", -1.0, "20091231000000", "20100101000000"),
            record("c", "NSO", 5.5, "20100102000000", "20100103000000"),
        ]
        .into_iter()
        .collect();

        assert_eq!(response.num_records(), 3);
        assert_eq!(response.total_size(), 15.5);
        let (start, end) = response.time_range().unwrap();
        assert_eq!(start.to_string(), "2009-12-31 00:00:00");
        assert_eq!(end.to_string(), "2010-01-03 00:00:00");
        assert_eq!(response.by_provider()["SDAC"].len(), 2);
        assert_eq!(response.select(|r| r.provider == "NSO").len(), 1);
    }

    #[test]
    fn test_table_has_fixed_columns() {
        let response = QueryResponse::new(vec![record("a", "SDAC", 1.0, "20100101000000", "20100101010000")]);
        let text = response.to_string();
        for column in ["Start time", "End time", "Source", "Instrument", "Type"] {
            assert!(text.contains(column), "{column}");
        }
        assert!(text.contains("2010-01-01 00:00:00"));
        assert!(text.contains("FULLDISK"));
    }
}
