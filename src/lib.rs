pub mod config;
pub mod controller;
pub mod events;
pub mod heartbeat;
pub mod jobs;
pub mod logging;
pub mod node;
pub mod schematic;
pub mod server;
pub mod shutdown;
pub mod utils;
pub mod wire;
