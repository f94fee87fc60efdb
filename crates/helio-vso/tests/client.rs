use std::sync::Mutex;

use helio_attr::{AttrType, ValueAttr};
use helio_vso::attrs::{Instrument, Time};
use helio_vso::{
    Attr, Block, ClientConfig, Error, GetDataRequest, GetDataResponse, LegacyQuery, ProviderItem, QueryResult, Record,
    Result, Translation, VsoApi, VsoClient,
};
use serde_json::{Value as Json, json};

/// Answers by instrument: `unknown` is not understood, `broken` fails, any
/// other name yields one record of its own plus a record shared by all.
#[derive(Default)]
struct Archive {
    blocks: Mutex<Vec<Block>>,
}

impl Archive {
    fn blocks(&self) -> Vec<Block> { self.blocks.lock().unwrap().clone() }
}

fn record(fileid: &str) -> Record {
    Record {
        fileid: fileid.into(),
        provider: "SDAC".into(),
        size: 10.0,
        ..Record::default()
    }
}

impl VsoApi for Archive {
    async fn query(&self, block: &Block) -> Result<QueryResult> {
        self.blocks.lock().unwrap().push(block.clone());
        let instrument = block
            .get(&"instrument".into())
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        match instrument.as_str() {
            "unknown" => Err(Error::TypeNotFound("instrument".into())),
            "broken" => Err(Error::Backend("provider down".into())),
            name => Ok(QueryResult {
                provideritem: vec![ProviderItem {
                    provider: "SDAC".into(),
                    no_of_records_found: 2,
                    no_of_records_returned: 2,
                    record: Some(vec![record(&format!("{name}-1")), record("common")]),
                    error: None,
                }],
            }),
        }
    }

    async fn get_data(&self, _: &GetDataRequest) -> Result<GetDataResponse> { Ok(GetDataResponse::default()) }
}

fn client(translation: Translation) -> VsoClient<Archive> {
    VsoClient::new(Archive::default(), ClientConfig::default().with_translation(translation))
}

fn window() -> Attr { Time::parse("2010-01-01", "2010-01-01 01:00").unwrap().into() }

fn field<'a>(block: &'a Block, path: &str) -> Option<&'a Json> { block.get(&helio_attr::FieldPath::dotted(path)) }

fn ids(response: &helio_vso::QueryResponse) -> Vec<&str> { response.iter().map(|r| r.fileid.as_str()).collect() }

#[tokio::test]
async fn test_time_and_instrument_make_one_block() {
    let client = client(Translation::Skip);
    let response = client.query([window(), Instrument::new("eit").into()]).await.unwrap();

    let blocks = client.api().blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(field(&blocks[0], "time.start"), Some(&json!("20100101000000")));
    assert_eq!(field(&blocks[0], "time.end"), Some(&json!("20100101010000")));
    assert_eq!(field(&blocks[0], "instrument"), Some(&json!("eit")));
    assert_eq!(field(&blocks[0], "source"), Some(&json!("")));
    assert_eq!(ids(&response), ["eit-1", "common"]);
    assert_eq!(response.total_size(), 20.0);
}

#[tokio::test]
async fn test_failing_blocks_do_not_hide_others() {
    let client = client(Translation::Skip);
    let alternatives = Instrument::new("broken") | Instrument::new("eit") | Instrument::new("unknown");
    let response = client.query([window(), alternatives]).await.unwrap();

    assert_eq!(client.api().blocks().len(), 3);
    assert_eq!(ids(&response), ["eit-1", "common"]);
    assert!(matches!(response.errors(), [Error::Backend(_)]));
}

#[tokio::test]
async fn test_alternatives_are_merged_without_duplicates() {
    let client = client(Translation::Skip);
    let response = client
        .query([Instrument::new("aia") | Instrument::new("eit")])
        .await
        .unwrap();

    let mut found = ids(&response);
    found.sort();
    assert_eq!(found, ["aia-1", "common", "eit-1"]);
    assert!(response.errors().is_empty());
}

#[tokio::test]
async fn test_conflicting_attributes_fail_immediately() {
    let client = client(Translation::Skip);
    let result = client
        .query([Attr::from(Instrument::new("eit")), Instrument::new("aia").into()])
        .await;

    assert!(matches!(result, Err(Error::Attr(_))));
    assert!(client.api().blocks().is_empty());
}

fn mystery() -> Attr { ValueAttr::typed(AttrType::new("mystery"), [("mystery", "x")]).into() }

#[tokio::test]
async fn test_untranslatable_disjunct_is_skipped() {
    let client = client(Translation::Skip);
    let response = client.query([mystery() | Instrument::new("eit")]).await.unwrap();

    assert_eq!(ids(&response), ["eit-1", "common"]);
    assert!(matches!(response.errors(), [Error::Walk(_)]));
}

#[tokio::test]
async fn test_untranslatable_disjunct_aborts() {
    let client = client(Translation::Abort);
    let result = client.query([mystery() | Instrument::new("eit")]).await;

    assert!(matches!(result, Err(Error::Walk(_))));
    assert!(client.api().blocks().is_empty());
}

#[tokio::test]
async fn test_legacy_query() {
    let client = client(Translation::Skip);

    let response = client
        .query_legacy(&LegacyQuery::new().with("inst", "eit").with("start", "2010-01-01"))
        .await
        .unwrap();
    assert_eq!(response.len(), 2);
    assert_eq!(field(&client.api().blocks()[0], "time.start"), Some(&json!("20100101000000")));

    let response = client.query_legacy(&LegacyQuery::new().with("inst", "unknown")).await.unwrap();
    assert!(response.is_empty());

    let result = client.query_legacy(&LegacyQuery::new().with("inst", "broken")).await;
    assert!(matches!(result, Err(Error::Backend(_))));
}

#[tokio::test]
async fn test_latest_asks_for_recent_records() {
    let client = client(Translation::Skip);
    client.latest().await.unwrap();

    let blocks = client.api().blocks();
    let near = field(&blocks[0], "time.near").and_then(Json::as_str).unwrap();
    let end = field(&blocks[0], "time.end").and_then(Json::as_str).unwrap();
    assert_eq!(near, end);
    assert_eq!(near.len(), 14);
}
