pub mod sampling_loop;
pub mod session;
pub mod tick_logger;
