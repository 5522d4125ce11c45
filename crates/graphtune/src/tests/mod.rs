#![cfg(test)]

pub(crate) mod support;
