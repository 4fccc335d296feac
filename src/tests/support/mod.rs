pub mod samplers;
pub mod services;

pub use samplers::{Reading, ScriptedSampler, SharedReading};
pub use services::{spawn_echo_backend, EchoService, NamedService};
