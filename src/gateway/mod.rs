//! Gateway module - backend selection, health monitoring, and forwarding

pub mod health_check;
pub mod load_balancer;
pub mod proxy;
