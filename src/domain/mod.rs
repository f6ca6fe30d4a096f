// Domain layer: data model and ports. No network or filesystem code lives here.

pub mod documents;
pub mod model;
pub mod ports;
