pub mod pool;
pub mod record;
pub mod tag;

pub use pool::*;
pub use record::*;
pub use tag::*;
