pub mod helpers;

mod capability_absence;
mod pipeline;
mod shutdown;
