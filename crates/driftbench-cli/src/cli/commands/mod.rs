mod dispatch;
pub mod status;
pub mod tick;

pub use dispatch::dispatch;
