//! Reusable widget components.

pub mod detail;
pub mod table;

pub use detail::DetailPanel;
pub use table::{footer_text, ListTable};
