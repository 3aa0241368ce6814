#![allow(dead_code)]
pub mod fake_card;
pub mod fake_ledger;
pub mod prepare_env;
