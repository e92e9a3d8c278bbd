mod common;
mod sla;
mod store;
