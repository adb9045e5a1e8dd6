// Domain layer: legacy/target models and ports (interfaces).

pub mod model;
pub mod ports;
