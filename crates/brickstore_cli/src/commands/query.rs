//! The `get-many` command.

use super::json::{parse_key, render};
use super::CliError;
use brickstore_core::{RangeQuery, Store};
use serde_json::Value as Json;

/// Options of `get-many`, as given on the command line.
#[derive(Debug, Default)]
pub struct QueryArgs {
    /// Index to order by.
    pub orderby: Option<String>,
    /// Descending order.
    pub reverse: bool,
    /// Inclusive lower bound, as JSON or a bare string.
    pub start: Option<String>,
    /// Inclusive upper bound, as JSON or a bare string.
    pub end: Option<String>,
    /// Maximum number of records.
    pub count: Option<usize>,
    /// Records to skip.
    pub offset: Option<usize>,
}

impl QueryArgs {
    fn into_query(self) -> Result<RangeQuery, CliError> {
        Ok(RangeQuery {
            orderby: self.orderby,
            reverse: self.reverse,
            start: self.start.as_deref().map(parse_key).transpose()?,
            end: self.end.as_deref().map(parse_key).transpose()?,
            count: self.count,
            offset: self.offset,
        })
    }
}

/// Runs `get-many`: prints the matching records as an array.
pub async fn run(store: &Store, args: QueryArgs) -> Result<Json, CliError> {
    let records = store.get_many(args.into_query()?).await?;
    records
        .iter()
        .map(render)
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array)
}
