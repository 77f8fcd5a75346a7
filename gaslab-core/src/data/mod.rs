//! Raw data: table layouts, parsing, normalization and fetchers.

pub mod http;
pub mod layout;
pub mod mirror;
pub mod parse;
pub mod provider;
pub mod schema;
pub mod synthetic;

pub use http::HttpFetcher;
pub use layout::{ColumnRole, TableLayout};
pub use mirror::MirrorFetcher;
pub use parse::{parse_table, ParseError};
pub use provider::{decode_site_table, FetchError, SiteFetcher, SiteRequest};
pub use schema::{
    canonicalize_columns, filter_site, normalize, regional_column_name, select_region, SchemaError,
};
pub use synthetic::SyntheticFetcher;
