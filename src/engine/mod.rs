pub mod exclusivity;
pub mod lifecycle;
pub mod queries;

#[cfg(test)]
pub(crate) mod test_support;
