pub mod reminder;
pub mod renewal;
pub mod subscription;
