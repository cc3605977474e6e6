//! Draft-league ETL pipeline over a medallion layout: raw API captures land
//! in bronze, cleaned typed tables in silver, and both classic aggregates
//! and a star schema in gold. Each layer only reads the one below it, so a
//! gold-only run can rebuild the model from silver files alone.

pub mod bronze;
pub mod config;
pub mod fetch;
pub mod gold;
pub mod gold_dimensions;
pub mod gold_facts;
pub mod merge;
pub mod publish;
pub mod silver;
pub mod slices;
pub mod store;
pub mod values;
