pub mod batches;
pub mod health;
pub mod redeem;
pub mod upload;
