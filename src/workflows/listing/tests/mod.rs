mod authorization;
mod common;
