//! FlashDB shared types
//!
//! Values, rows and result shapes exchanged between the statement compiler,
//! the engines and the connection handle. All types serialize to JSON so the
//! server can hand them out unchanged.

mod result;
mod row;
mod value;

pub use result::{QueryOutput, QueryResult};
pub use row::Row;
pub use value::{Value, ValueError};

/// Build a positional parameter list.
///
/// ```
/// use flashdb_types::{params, Value};
///
/// let params = params![5, "bob", None::<i64>];
/// assert_eq!(params, vec![Value::Integer(5), Value::Text("bob".into()), Value::Null]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}
