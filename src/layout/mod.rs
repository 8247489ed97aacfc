pub mod interaction;
pub mod render;
pub mod simulation;
