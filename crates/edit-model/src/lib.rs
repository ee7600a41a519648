//! Anitemp Edit Model
//!
//! Defines the data contracts the composition pipeline consumes:
//! - **Segment:** one ordered unit of video source, overlay text, and transition
//! - **Transition:** the fixed catalog of named boundary effects
//! - **EditList:** an ordered, id-unique list of segments that can be snapshotted
//! - **Template:** the persisted template record shape read from the content store

pub mod edit_list;
pub mod segment;
pub mod template;
pub mod transition;

pub use edit_list::*;
pub use segment::*;
pub use template::*;
pub use transition::*;
