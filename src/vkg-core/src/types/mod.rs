//! Database term types.

mod db_type;

pub use db_type::DbTermType;
