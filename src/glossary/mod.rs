pub mod editor;
pub mod highlight;
pub mod html_utils;
pub mod markup;
pub mod model;
pub mod popup;

pub use highlight::{HighlightedView, highlight};
pub use model::{Gender, Glossary};
pub use popup::resolve_click;
