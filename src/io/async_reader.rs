//! Asynchronous CSV reader with batch interface
//!
//! Streams transaction requests from a CSV source in fixed-size batches, so a
//! large request file never has to be held in memory at once.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → RequestBatch (requests + rejected rows)
//!                  ↓
//!           csv_format module
//!           (RequestRecord, convert_request_record)
//! ```
//!
//! A row naming an account but carrying a missing or non-integer amount is
//! answered with a `rejected` response on the spot, so it still gets an
//! output row. Rows without an account id, and rows the CSV layer cannot
//! parse, are logged and skipped.

use crate::io::csv_format::{convert_request_record, RequestRecord};
use crate::types::{TransactionRequest, TransactionResponse};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Rows read in one batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RequestBatch {
    /// Requests to dispatch, in file order
    pub requests: Vec<TransactionRequest>,
    /// Responses for rows rejected while reading
    pub rejected: Vec<TransactionResponse>,
}

impl RequestBatch {
    pub fn len(&self) -> usize {
        self.requests.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.rejected.is_empty()
    }
}

/// Asynchronous CSV request reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader over `reader`
    ///
    /// Fields are trimmed and rows may omit trailing optional columns.
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
        }
    }

    /// Read up to `batch_size` rows
    ///
    /// Returns an empty batch once the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> RequestBatch {
        let mut batch = RequestBatch::default();
        let mut records = self.csv_reader.deserialize::<RequestRecord>();

        while batch.len() < batch_size {
            let Some(next) = records.next().await else {
                break;
            };
            self.line_num += 1;

            match next {
                Ok(record) => match convert_request_record(record) {
                    Ok(request) => batch.requests.push(request),
                    Err(error) => match error.to_response() {
                        Some(response) => {
                            tracing::warn!(line = self.line_num, %error, "rejecting request row");
                            batch.rejected.push(response);
                        }
                        None => tracing::warn!(line = self.line_num, %error, "skipping request row"),
                    },
                },
                Err(error) => tracing::warn!(line = self.line_num, %error, "CSV parse error"),
            }
        }

        batch
    }
}
