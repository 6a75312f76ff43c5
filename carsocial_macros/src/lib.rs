mod row;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Row)] derive macro
// ============================================================================

/// Derive macro for the `Row` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Row)]
/// #[row(collection = "posts")]
/// struct Post {
///     #[row(id)]
///     pub id: String,
///     pub author_id: String,
///     pub title: String,
/// }
/// ```
///
/// - `#[row(collection = "...")]` sets the remote collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[row(id)]` marks the field used as the unique identifier.
///   If omitted, defaults to a field named `id`.
/// - `#[row(skip)]` leaves a field out of the projected column list
///   (use together with `#[serde(skip)]` or `#[serde(default)]`).
///
/// Every other named field becomes part of `Row::COLUMNS`, the projection
/// requested when the row is fetched.
#[proc_macro_derive(Row, attributes(row))]
pub fn derive_row(input: TokenStream) -> TokenStream {
    row::derive_row(input)
}
