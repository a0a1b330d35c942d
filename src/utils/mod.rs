pub mod address_validator;
pub mod amount;
