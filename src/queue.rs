use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::api::{Endpoint, Transport};
use crate::error::FetchError;
use crate::filters::QueueParams;
use crate::models::{CustomerRiskRecord, QueuePage};
use crate::normalize::{self, num_or};

/// Content fingerprint of a record: identifier, region, renewal days, MRR
/// and risk score.
pub fn fingerprint(record: &CustomerRiskRecord) -> String {
    [
        record.id.clone(),
        record.region.clone(),
        record.renewal_days.to_string(),
        record.mrr.to_string(),
        record.risk.to_string(),
    ]
    .join("|")
}

/// Rendering identity for a row. Backend ids repeat, so the position in the
/// retrieval (batch offset and index inside the batch) is appended.
pub fn row_identity(record: &CustomerRiskRecord, offset: usize, index: usize) -> String {
    format!("{}|{}|{}", fingerprint(record), offset, index)
}

/// Normalizes a `/queue` body. Accepts the `{items, total}` envelope and,
/// for older backends, a bare array (total = its length).
pub fn parse_page(body: &Value, offset: usize, url: &str) -> Result<QueuePage, FetchError> {
    let (raw_items, total) = match body {
        Value::Object(map) => {
            let items = map.get("items").cloned().unwrap_or(Value::Null);
            let total = num_or(map.get("total"), 0.0).max(0.0) as usize;
            (items, total)
        }
        Value::Array(items) => (body.clone(), items.len()),
        other => {
            return Err(FetchError::Malformed {
                url: url.to_string(),
                reason: format!("expected queue envelope, got {}", kind(other)),
            })
        }
    };

    let items = normalize::list_of(&raw_items, normalize::customer)
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            record.row_id = row_identity(&record, offset, index);
            record
        })
        .collect();

    Ok(QueuePage {
        items,
        total,
        offset,
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Requests exactly one page.
#[instrument(skip(transport, params), fields(offset = params.offset, limit = params.limit))]
pub async fn fetch_page<T: Transport>(
    transport: &T,
    params: &QueueParams,
) -> Result<QueuePage, FetchError> {
    let body = transport
        .get_json(Endpoint::Queue, &params.to_query())
        .await?;
    let page = parse_page(&body, params.offset, Endpoint::Queue.path())?;
    debug!(items = page.items.len(), total = page.total, "queue page");
    Ok(page)
}

/// Result of walking the queue batch by batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueueWalk {
    pub records: Vec<CustomerRiskRecord>,
    /// Total reported by the first batch.
    pub total: usize,
    pub requests: usize,
}

/// Walks `/queue` from offset zero in `batch`-sized steps, concatenating the
/// results. Stops on a short batch, at `cap`, or once the offset covers the
/// total reported by the first batch. Any failed batch aborts the walk.
#[instrument(skip(transport, params))]
pub async fn fetch_all<T: Transport>(
    transport: &T,
    params: &QueueParams,
    batch: usize,
    cap: usize,
) -> Result<QueueWalk, FetchError> {
    let batch = batch.max(1);
    let mut walk = QueueWalk::default();
    let mut offset = 0usize;

    while offset < cap {
        let page = fetch_page(transport, &params.at(offset, batch)).await?;
        walk.requests += 1;
        if offset == 0 {
            walk.total = page.total;
        }

        let received = page.items.len();
        walk.records.extend(page.items);

        if received < batch {
            break;
        }
        offset += batch;
        if offset >= walk.total {
            break;
        }
    }

    info!(
        total = walk.total,
        loaded = walk.records.len(),
        requests = walk.requests,
        "queue walk finished"
    );
    Ok(walk)
}

/// Page cursor over a server-side total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page
            .saturating_add(1)
            .saturating_mul(self.page_size)
            < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    /// Index of the next page, or `None` past the known total.
    pub fn next(&self) -> Option<usize> {
        self.has_next().then_some(self.page + 1)
    }

    /// Index of the previous page, or `None` at page zero.
    pub fn prev(&self) -> Option<usize> {
        self.has_prev().then(|| self.page - 1)
    }
}
