//! reqwest-backed archive access and file transfer.

use std::path::PathBuf;

use futures_util::StreamExt;
use helio_attr::Block;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, Proxy, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::api::{GetDataRequest, GetDataResponse, QueryRequest, VsoApi};
use crate::config::ClientConfig;
use crate::download::Transfer;
use crate::error::{Error, Result};
use crate::naming::FileNamer;
use crate::response::QueryResult;

fn build_client(proxies: &[String]) -> Result<Client> {
    let mut cb = Client::builder().user_agent(concat!("helio-vso/", env!("CARGO_PKG_VERSION")));

    let proxies = proxies
        .iter()
        .map(|p| Url::parse(p).map_err(|e| Error::Backend(format!("invalid proxy {p:?}: {e}"))))
        .collect::<Result<Vec<_>>>()?;
    let (secure, insecure): (Vec<Url>, Vec<Url>) = proxies.into_iter().partition(|u| u.scheme() == "https");

    for u in secure {
        cb = cb.proxy(Proxy::https(u)?);
    }

    for u in insecure {
        cb = cb.proxy(Proxy::http(u)?);
    }

    Ok(cb.build()?)
}

/// JSON client for the archive's `query` and `getdata` endpoints.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    url:    String,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.proxies)?,
            url:    config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> &str { &self.url }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.url);
        debug!(%url, "posting");
        let response = self.client.post(&url).json(body).send().await?;

        // The archive answers 501 for fields or types it does not know.
        if response.status() == StatusCode::NOT_IMPLEMENTED {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::TypeNotFound(detail));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

impl VsoApi for HttpApi {
    async fn query(&self, block: &Block) -> Result<QueryResult> { self.post("query", &QueryRequest { block }).await }

    async fn get_data(&self, request: &GetDataRequest) -> Result<GetDataResponse> {
        self.post("getdata", request).await
    }
}

/// Streams a URL to disk.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(&config.proxies)?,
        })
    }
}

impl Transfer for HttpTransfer {
    async fn fetch(&self, url: &str, namer: &FileNamer) -> Result<PathBuf> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let path = namer.resolve(disposition.as_deref(), url)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        debug!(%url, path = %path.display(), "saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxies_are_validated() {
        assert!(build_client(&["https://proxy.example:8443".into(), "http://proxy.example:3128".into()]).is_ok());
        assert!(matches!(build_client(&["not a url".into()]), Err(Error::Backend(_))));
    }

    #[test]
    fn test_trailing_slash_is_dropped() {
        let config = ClientConfig::default().with_url("https://archive.example/api/");
        assert_eq!(HttpApi::new(&config).unwrap().url(), "https://archive.example/api");
    }
}
