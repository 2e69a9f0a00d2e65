pub mod filter;
pub mod reconcile;
pub mod store;

#[cfg(test)]
pub mod test_helpers;
