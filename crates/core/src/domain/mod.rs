pub mod asset;
pub mod contract;
pub mod history;
pub mod reading;
pub mod recommendation;
pub mod record;
pub mod research;
pub mod validation;
