pub mod popup;
pub mod search_box;
pub mod seekbar;
