pub mod check;
pub mod render;
pub mod speak;
pub mod voices;
