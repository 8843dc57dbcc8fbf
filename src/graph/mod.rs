pub mod artifact;
pub mod builder;
pub mod conversion;
pub mod definition;
pub mod loader;
pub mod model;
pub mod search;

pub use builder::*;
pub use conversion::*;
pub use definition::*;
pub use loader::*;
pub use model::*;
pub use search::Direction;
