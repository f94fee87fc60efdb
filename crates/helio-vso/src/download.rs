//! Negotiates transfer instructions with the archive and runs the transfers.
//!
//! Each provider group in a transfer-instructions response carries a status.
//! `200` groups are transferred, `300`/`412`/`405` groups are resolved through
//! a [`Negotiator`] and asked for again, anything else fails that group only.
//! Rounds are processed from a work-list, so a provider that keeps asking
//! for more is cut off by the round cap instead of growing the stack.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::api::{DataRequestItem, DataResponseItem, GetDataRequest, VsoApi};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::naming::FileNamer;
use crate::negotiate::Negotiator;
use crate::response::{QueryResponse, Record};
use crate::results::Results;

/// Where the status code sits in the status string, per protocol version.
/// Newest first; the first entry not newer than the response's version wins.
const GET_VERSION: [(&str, (usize, usize)); 3] = [("0.8", (5, 8)), ("0.7", (1, 4)), ("0.6", (0, 3))];

const DEFAULT_VERSION: &str = "0.6";
const DEFAULT_STATUS: &str = "200";

/// Fetches one URL to the path chosen by `namer`.
pub trait Transfer: Send + Sync + 'static {
    fn fetch(&self, url: &str, namer: &FileNamer) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// A finished transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    pub path:   PathBuf,
    pub record: Record,
}

#[derive(Debug)]
struct Round {
    request: GetDataRequest,
    depth:   usize,
}

#[derive(Debug)]
enum Step {
    Transfer(DataResponseItem),
    Retry(GetDataRequest),
    Fail(Error),
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

/// The status code of a response item, decoded per its protocol version.
fn status_code(item: &DataResponseItem) -> Result<String> {
    let version = item.version.as_deref().unwrap_or(DEFAULT_VERSION);
    let unknown = || Error::UnknownVersion {
        provider: item.provider.clone(),
        version:  version.to_string(),
    };

    let parsed = parse_version(version).ok_or_else(unknown)?;
    let (from, to) = GET_VERSION
        .iter()
        .find(|(known, _)| parse_version(known).is_some_and(|known| parsed >= known))
        .map(|(_, span)| *span)
        .ok_or_else(unknown)?;

    Ok(match &item.status {
        None => DEFAULT_STATUS.to_string(),
        Some(status) => status
            .get(from..to.min(status.len()))
            .unwrap_or_default()
            .to_string(),
    })
}

/// `request` cut down to the provider and files of one response item.
fn narrowed(request: &GetDataRequest, item: &DataResponseItem) -> GetDataRequest {
    let mut fileids = item.fileids();
    if fileids.is_empty() {
        fileids = request
            .items
            .iter()
            .filter(|requested| requested.provider == item.provider)
            .flat_map(|requested| requested.fileids.iter().cloned())
            .collect();
    }
    GetDataRequest::new(request.methods.clone(), request.info.clone(), vec![DataRequestItem {
        provider: item.provider.clone(),
        fileids,
    }])
}

/// Downloads in the order of the records of `response`, skipping records
/// that were not delivered.
pub fn link(response: &QueryResponse, downloads: &HashMap<String, Download>) -> Vec<Download> {
    response
        .iter()
        .filter_map(|record| downloads.get(&record.fileid).cloned())
        .collect()
}

/// Drives negotiation rounds and bounded-parallel transfers.
#[derive(Debug)]
pub struct DownloadCoordinator<T> {
    transfer:   Arc<T>,
    semaphore:  Arc<Semaphore>,
    max_rounds: usize,
}

impl<T: Transfer> DownloadCoordinator<T> {
    pub fn new(transfer: T, max_concurrent: usize, max_rounds: usize) -> Self {
        Self {
            transfer: Arc::new(transfer),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_rounds,
        }
    }

    pub fn from_config(transfer: T, config: &ClientConfig) -> Self {
        Self::new(transfer, config.max_concurrent, config.max_rounds)
    }

    pub fn max_rounds(&self) -> usize { self.max_rounds }

    /// Resolve `request` and start a transfer for every ready item.
    ///
    /// Each transfer holds its own ticket on `results`; failed groups are
    /// noted without touching the pending count. The caller keeps a guard
    /// unit on `results` and releases it after this returns.
    pub async fn run<A: VsoApi>(
        &self,
        api: &A,
        negotiator: &dyn Negotiator,
        request: GetDataRequest,
        records: Arc<HashMap<String, Record>>,
        template: &str,
        results: &Results<Download>,
    ) {
        let mut work = VecDeque::from([Round { request, depth: 0 }]);

        while let Some(round) = work.pop_front() {
            debug!(depth = round.depth, groups = round.request.items.len(), methods = ?round.request.methods, "requesting transfer instructions");
            let response = match api.get_data(&round.request).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(%err, depth = round.depth, "transfer instructions unavailable");
                    results.note_error(err);
                    continue;
                }
            };

            for item in response.items {
                match self.step(negotiator, &round, item) {
                    Step::Transfer(item) => self.transfer(&round.request, item, &records, template, results),
                    Step::Retry(request) => work.push_back(Round {
                        request,
                        depth: round.depth + 1,
                    }),
                    Step::Fail(err) => {
                        warn!(%err, "provider group failed");
                        results.note_error(err);
                    }
                }
            }
        }
    }

    fn step(&self, negotiator: &dyn Negotiator, round: &Round, item: DataResponseItem) -> Step {
        let code = match status_code(&item) {
            Ok(code) => code,
            Err(err) => return Step::Fail(err),
        };
        let provider = item.provider.clone();
        debug!(%provider, %code, depth = round.depth, "negotiation round");

        match code.as_str() {
            "200" => return Step::Transfer(item),
            "300" | "412" | "405" => {}
            _ => return Step::Fail(Error::UnknownStatus { provider, status: code }),
        }
        if round.depth >= self.max_rounds {
            return Step::Fail(Error::NegotiationLimit {
                provider,
                rounds: self.max_rounds,
            });
        }

        let mut request = narrowed(&round.request, &item);
        match code.as_str() {
            "300" => match negotiator.multiple_choices(&item.methods, &item) {
                Some(methods) => request.methods = methods,
                None => {
                    return Step::Fail(Error::MultipleChoices {
                        provider,
                        choices: item.methods,
                    });
                }
            },
            "412" => {
                let field = item.info.unwrap_or_default();
                match negotiator.missing_information(&request.info, &field) {
                    Some(value) => {
                        request.info.insert(field, value);
                    }
                    None => return Step::Fail(Error::MissingInformation { provider, field }),
                }
            }
            _ => match negotiator.unknown_method(&item) {
                Some(methods) => request.methods = methods,
                None => {
                    return Step::Fail(Error::UnknownMethod {
                        provider,
                        methods: request.methods,
                    });
                }
            },
        }
        Step::Retry(request)
    }

    fn transfer(
        &self,
        request: &GetDataRequest,
        item: DataResponseItem,
        records: &HashMap<String, Record>,
        template: &str,
        results: &Results<Download>,
    ) {
        let method = item
            .methods
            .first()
            .or_else(|| request.methods.first())
            .cloned()
            .unwrap_or_default();

        for data in item.data {
            let ticket = results.require(data.fileids.iter().cloned());
            let failed = |reason: String| Error::DownloadFailed {
                provider: item.provider.clone(),
                reason,
            };

            if !method.starts_with("URL") {
                ticket.fail(failed(format!("unsupported method {method:?}")));
                continue;
            }
            let Some(record) = data.fileids.first().and_then(|id| records.get(id)).cloned() else {
                ticket.fail(failed(format!("no requested record among {:?}", data.fileids)));
                continue;
            };
            let namer = match FileNamer::new(template, &record) {
                Ok(namer) => namer,
                Err(err) => {
                    ticket.fail(err);
                    continue;
                }
            };

            let transfer = Arc::clone(&self.transfer);
            let semaphore = Arc::clone(&self.semaphore);
            let provider = item.provider.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    ticket.fail(Error::Task("transfer pool closed".into()));
                    return;
                };
                match transfer.fetch(&data.url, &namer).await {
                    Ok(path) => {
                        debug!(url = %data.url, path = %path.display(), "transfer finished");
                        ticket.submit(Download { path, record });
                    }
                    Err(err) => {
                        warn!(url = %data.url, %err, "transfer failed");
                        ticket.fail(Error::DownloadFailed {
                            provider,
                            reason: err.to_string(),
                        });
                    }
                }
            });
        }
    }
}
