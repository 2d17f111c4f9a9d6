pub mod audit;
pub mod health;
pub mod records;
pub mod scope;
