use thiserror::Error;

use crate::model::ChannelKind;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("no {kind} columns recognized among {header_len} header cells")]
    NoRecognizedColumns { kind: ChannelKind, header_len: usize },

    #[error("invalid channel depth entry '{key}': {message}")]
    InvalidChannelDepth { key: String, message: String },
}
