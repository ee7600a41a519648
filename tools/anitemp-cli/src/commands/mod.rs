pub mod check;
pub mod compose;
pub mod templates;
pub mod transitions;
