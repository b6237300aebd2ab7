//! Dynamic value substrate for BQL.
//!
//! This module contains the fundamental data types that tuples are made of:
//! - [`Value`] - the tagged dynamic value all evaluation is built on
//! - [`Path`] - compiled navigation expressions over nested values
//! - total ordering, equality and group-key hashing over values

pub mod compare;
pub mod path;
pub mod value;

pub use compare::{compare, equal, hash_value};
pub use path::{Path, Selector};
pub use value::{parse_number, Value, ValueType};
