//! The archive service seen from the client.

use std::collections::BTreeMap;
use std::future::Future;

use helio_attr::Block;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::response::{QueryResponse, QueryResult};

/// Extra information sent along with a transfer-instructions request.
pub type Info = BTreeMap<String, String>;

/// Body of a query call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueryRequest<'a> {
    pub block: &'a Block,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequestItem {
    pub provider: String,
    pub fileids:  Vec<String>,
}

/// Request for transfer instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataRequest {
    /// Acceptable delivery methods, most preferred first.
    pub methods: Vec<String>,
    #[serde(default)]
    pub info:    Info,
    pub items:   Vec<DataRequestItem>,
}

impl GetDataRequest {
    pub fn new(methods: Vec<String>, info: Info, items: Vec<DataRequestItem>) -> Self { Self { methods, info, items } }

    /// One item per provider covering every record of `response`.
    pub fn for_response(response: &QueryResponse, methods: Vec<String>) -> Self {
        let items = response
            .by_provider()
            .into_iter()
            .map(|(provider, records)| DataRequestItem {
                provider: provider.to_string(),
                fileids:  records.iter().map(|r| r.fileid.clone()).collect(),
            })
            .collect();
        Self::new(methods, Info::new(), items)
    }
}

/// A URL and the file ids it delivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(default)]
    pub url:     String,
    #[serde(default)]
    pub fileids: Vec<String>,
}

/// Transfer instructions for one provider group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResponseItem {
    pub provider: String,
    /// Protocol version; decides where the status code sits in `status`.
    #[serde(default)]
    pub version:  Option<String>,
    #[serde(default)]
    pub status:   Option<String>,
    /// Offered methods on 300, the method in use on 200.
    #[serde(default)]
    pub methods:  Vec<String>,
    /// Name of the missing field on 412.
    #[serde(default)]
    pub info:     Option<String>,
    #[serde(default)]
    pub data:     Vec<DataItem>,
    #[serde(default)]
    pub details:  Option<String>,
}

impl DataResponseItem {
    pub fn fileids(&self) -> Vec<String> {
        self.data
            .iter()
            .flat_map(|item| item.fileids.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataResponse {
    #[serde(default)]
    pub items: Vec<DataResponseItem>,
}

/// Remote archive operations.
///
/// Implementations map "the archive does not know this field or type" to
/// [`Error::TypeNotFound`](crate::Error::TypeNotFound); the client reads it
/// as zero results.
pub trait VsoApi: Send + Sync {
    fn query(&self, block: &Block) -> impl Future<Output = Result<QueryResult>> + Send;

    fn get_data(&self, request: &GetDataRequest) -> impl Future<Output = Result<GetDataResponse>> + Send;
}
