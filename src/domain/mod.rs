// Domain layer: entities, rules, and the ports use cases depend on.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod short_url;
