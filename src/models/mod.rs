pub mod approval;
pub mod chemical;
pub mod user;
