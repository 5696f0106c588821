pub mod identity;
pub mod identity_cache;
pub mod identity_filter;
pub mod pagination;
pub mod validation;
