mod args;
mod logger;
