pub mod error;
mod evacuate;
pub mod nodes;
pub mod options;
pub mod outcome;
pub mod sink;

pub use self::error::EvacuationError;
pub use self::evacuate::Evacuator;
