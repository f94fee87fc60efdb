//! Query and download client for a virtual solar data archive.
//!
//! Searches are built from [`attrs`] combined with `|` and [`Attr::and`],
//! then run through a [`VsoClient`]. Downloads go through a
//! [`DownloadCoordinator`] that negotiates transfer instructions with each
//! provider and reports into a [`Results`] handle.
//!
//! ```no_run
//! # async fn run() -> helio_vso::Result<()> {
//! use helio_vso::attrs::{Instrument, Time};
//! use helio_vso::{Attr, ClientConfig, GetOptions, VsoClient};
//!
//! let client = VsoClient::connect(ClientConfig::load(None)?)?;
//! let window = Time::parse("2010-01-01", "2010-01-01 01:00")?;
//! let found = client
//!     .query([Attr::from(window), Attr::from(Instrument::new("eit"))])
//!     .await?;
//! println!("{found}");
//!
//! let downloads = client.get(&found, GetOptions::default().path("~/data/{file}")).await?;
//! for (fileid, download) in downloads.finished().await.iter() {
//!     println!("{fileid} -> {}", download.path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod api;
pub mod attrs;
mod client;
mod config;
mod download;
mod error;
#[cfg(feature = "reqwest")]
mod http;
mod legacy;
mod naming;
mod negotiate;
mod response;
mod results;
mod time;
mod units;

pub use api::{DataItem, DataRequestItem, DataResponseItem, GetDataRequest, GetDataResponse, Info, QueryRequest, VsoApi};
pub use client::{GetOptions, VsoClient};
pub use config::{ClientConfig, DEFAULT_URL, METHOD_ORDER, Translation};
pub use download::{Download, DownloadCoordinator, Transfer, link};
pub use error::{Error, Result};
pub use helio_attr::{Attr, Block};
#[cfg(feature = "reqwest")]
pub use http::{HttpApi, HttpTransfer};
pub use legacy::LegacyQuery;
pub use naming::{FileNamer, disposition_filename};
pub use negotiate::{Declining, DefaultNegotiator, InteractiveNegotiator, Negotiator};
pub use response::{ProviderItem, QueryResponse, QueryResult, Record, RecordExtent, TimeSpan};
pub use results::{Results, Ticket};
pub use time::{TIMEFORMAT, format_time, parse_time};
pub use units::to_angstrom;
