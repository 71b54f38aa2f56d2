pub mod errors;
pub mod formats;
pub mod model;

pub use errors::ParserError;
pub use formats::{identify_columns, parse_optional_f64, parse_table};
pub use model::{ChannelDepthTable, ChannelKind, ColumnDescriptor, DepthSource, RawTable};
