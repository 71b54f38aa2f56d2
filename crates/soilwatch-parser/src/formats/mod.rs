mod columns;
mod common;
mod table;

pub use columns::identify_columns;
pub use common::parse_optional_f64;
pub use table::parse_table;
