mod config;
mod operation;
mod tunnel;
