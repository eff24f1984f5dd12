pub mod window_manager;

pub use window_manager::{WarmupPolicy, WarmupWindow, WindowQuality, select_window};
