/// Bounded window of recent request outcomes
pub mod sliding_window;

pub use sliding_window::SlidingWindow;
