#![cfg(test)]

mod config;
mod logging;
