pub mod event;
pub mod record;
pub mod result;

pub use event::*;
pub use record::*;
pub use result::*;
