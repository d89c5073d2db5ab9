/// Extension pages
pub mod components;
pub mod options;
pub mod popup;
