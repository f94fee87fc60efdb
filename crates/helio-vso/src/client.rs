//! Caller-facing query and download surface.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use helio_attr::{Attr, Block, Walker};
use tracing::{debug, warn};

use crate::api::{GetDataRequest, VsoApi};
use crate::attrs::{self, Time};
use crate::config::{ClientConfig, Translation};
use crate::download::{Download, DownloadCoordinator, Transfer};
use crate::error::{Error, Result};
use crate::legacy::LegacyQuery;
use crate::negotiate::{DefaultNegotiator, Negotiator};
use crate::response::{QueryResponse, QueryResult};
use crate::results::Results;

/// Where and how to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    /// Path template, e.g. `"~/data/{source}/{instrument}/{file}"`. An
    /// existing directory gets `{file}` appended; `None` downloads into a
    /// fresh temporary directory.
    pub path:    Option<String>,
    /// Acceptable methods, most preferred first. Empty means the configured
    /// method order followed by `URL`.
    pub methods: Vec<String>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            path:    None,
            methods: vec!["URL-FILE".to_string()],
        }
    }
}

impl GetOptions {
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match home::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}

fn path_template(path: Option<&str>) -> Result<String> {
    let template = match path {
        Some(path) => {
            let path = std::path::absolute(expand_home(path))?;
            if path.is_dir() { path.join("{file}") } else { path }
        }
        None => tempfile::Builder::new()
            .prefix("helio-")
            .tempdir()?
            .keep()
            .join("{file}"),
    };
    Ok(template.to_string_lossy().into_owned())
}

/// Client for one archive endpoint.
pub struct VsoClient<A> {
    api:        Arc<A>,
    walker:     Walker<Block>,
    template:   Block,
    negotiator: Arc<dyn Negotiator>,
    config:     ClientConfig,
}

impl<A: VsoApi> VsoClient<A> {
    pub fn new(api: A, config: ClientConfig) -> Self {
        Self {
            api: Arc::new(api),
            walker: attrs::walker(),
            template: attrs::query_block(),
            negotiator: Arc::new(DefaultNegotiator::new(config.method_order.clone())),
            config,
        }
    }

    /// Replace the strategy used to resolve negotiation rounds.
    #[must_use]
    pub fn with_negotiator(mut self, negotiator: impl Negotiator + 'static) -> Self {
        self.negotiator = Arc::new(negotiator);
        self
    }

    pub fn api(&self) -> &A { &self.api }

    pub fn config(&self) -> &ClientConfig { &self.config }

    pub fn walker(&self) -> &Walker<Block> { &self.walker }

    /// Query with the conjunction of `attrs`.
    ///
    /// Conflicting attributes fail the call. Each alternative of the
    /// normalised expression becomes one archive query; a query the archive
    /// cannot answer contributes nothing, and any other failure is kept on
    /// the response while the remaining queries proceed.
    pub async fn query<I>(&self, attrs: I) -> Result<QueryResponse>
    where
        I: IntoIterator,
        I::Item: Into<Attr>,
    {
        let query = Attr::all(attrs)?;
        let mut errors: Vec<Error> = Vec::new();
        let mut blocks = Vec::new();

        for disjunct in query.disjuncts() {
            match self.walker.create(disjunct, &self.template) {
                Ok(created) => blocks.extend(created),
                Err(err) if self.config.translation == Translation::Skip => {
                    warn!(%err, %disjunct, "skipping untranslatable query");
                    errors.push(err.into());
                }
                Err(err) => return Err(err.into()),
            }
        }

        let answers = join_all(blocks.iter().map(|block| self.api.query(block))).await;
        let mut results = Vec::with_capacity(answers.len());
        for answer in answers {
            match answer {
                Ok(result) => results.push(result),
                Err(err) if err.is_type_not_found() => debug!(%err, "no results for block"),
                Err(err) => {
                    warn!(%err, "query failed");
                    errors.push(err);
                }
            }
        }

        let mut response = QueryResponse::from_result(QueryResult::merge(results));
        for err in errors {
            response.add_error(err);
        }
        debug!(records = response.len(), errors = response.errors().len(), "query finished");
        Ok(response)
    }

    /// Query with flat keyword criteria.
    pub async fn query_legacy(&self, query: &LegacyQuery) -> Result<QueryResponse> {
        let block = query.to_block(&self.template)?;
        match self.api.query(&block).await {
            Ok(result) => Ok(QueryResponse::from_result(result)),
            Err(err) if err.is_type_not_found() => {
                debug!(%err, "no results for legacy query");
                Ok(QueryResponse::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Records of the last seven days, asking for those nearest to now.
    pub async fn latest(&self) -> Result<QueryResponse> {
        let now = Utc::now().naive_utc();
        self.query([Time::new(now - Duration::days(7), now).near(now)]).await
    }

    /// Download the records of `response` through `coordinator`.
    ///
    /// The returned handle completes once every transfer has either landed
    /// or failed; its map is keyed by file id and holds only records of
    /// `response`.
    pub async fn get_with<T: Transfer>(
        &self,
        response: &QueryResponse,
        options: GetOptions,
        coordinator: &DownloadCoordinator<T>,
    ) -> Result<Results<Download>> {
        let template = path_template(options.path.as_deref())?;
        let methods = if options.methods.is_empty() {
            let mut methods = self.config.method_order.clone();
            methods.push("URL".to_string());
            methods
        } else {
            options.methods
        };

        let wanted: HashSet<String> = response.iter().map(|r| r.fileid.clone()).collect();
        let results = Results::new(1).finalize_with(move |mut map| {
            map.retain(|fileid, _| wanted.contains(fileid));
            map
        });
        if response.is_empty() {
            results.release();
            return Ok(results);
        }

        let records: HashMap<_, _> = response.iter().map(|r| (r.fileid.clone(), r.clone())).collect();
        let request = GetDataRequest::for_response(response, methods);
        debug!(records = records.len(), %template, "starting download");
        coordinator
            .run(&*self.api, &*self.negotiator, request, Arc::new(records), &template, &results)
            .await;
        results.release();
        Ok(results)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::http::{HttpApi, HttpTransfer};

    impl VsoClient<HttpApi> {
        /// Client for the endpoint named in `config`.
        pub fn connect(config: ClientConfig) -> Result<Self> {
            let api = HttpApi::new(&config)?;
            Ok(Self::new(api, config))
        }
    }

    impl<A: VsoApi> VsoClient<A> {
        /// Download over HTTP with the configured concurrency and round cap.
        pub async fn get(&self, response: &QueryResponse, options: GetOptions) -> Result<Results<Download>> {
            let coordinator = DownloadCoordinator::from_config(HttpTransfer::new(&self.config)?, &self.config);
            self.get_with(response, options, &coordinator).await
        }
    }
}

impl<A> std::fmt::Debug for VsoClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsoClient")
            .field("url", &self.config.url)
            .field("walker", &self.walker)
            .finish_non_exhaustive()
    }
}
