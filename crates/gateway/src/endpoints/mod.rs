//! # Shimエンドポイント

pub mod query;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use query::handle_query;
