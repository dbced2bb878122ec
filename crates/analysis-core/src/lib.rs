pub mod columns;
pub mod error;
pub mod table;
pub mod traits;
pub mod types;

pub use error::*;
pub use table::*;
pub use traits::*;
pub use types::*;
