pub mod events;
pub mod logs;
pub mod maintenance;
pub mod system;
