pub mod app;
pub mod camera;
pub mod layout;
pub mod model;
pub mod navigation;
pub mod store;
pub mod util;
