#[cfg(test)]
pub mod mock_ledger;
pub mod prepare_env;
