mod pipeline;
mod scheduler;

pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
