pub mod toml_loader;

pub use toml_loader::{load_converted_text, load_row_sheets, parse_row_sheets};
