mod buffered;
mod frame;
mod group;
mod track;

pub use buffered::*;
pub use frame::*;
pub use track::*;
