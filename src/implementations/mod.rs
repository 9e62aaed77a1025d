pub mod controller;
pub mod monitor;
pub mod rendezvous;
pub mod single;
pub mod step;
pub mod worker;
