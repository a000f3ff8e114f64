mod loopback;
mod status;
