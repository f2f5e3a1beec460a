pub mod billing_cycle;
pub mod subscription;
pub mod subscription_status;
