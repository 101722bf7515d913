pub mod frame_counter;

pub use frame_counter::FrameCounter;
