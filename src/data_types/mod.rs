pub mod atom;
pub mod datum;
pub mod row;
pub mod value;

// Re-export everything for compatibility
pub use atom::*;
pub use datum::*;
pub use row::*;
pub use value::*;
