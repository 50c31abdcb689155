pub mod error;
pub mod response;

#[cfg(test)]
pub mod testing;
