pub mod group_code;
pub mod jwt;
pub mod validation;
