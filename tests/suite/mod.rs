mod config;
mod device_token;
mod gateway;
mod roundtrip;
