mod expand_and_resolve_path;

pub use expand_and_resolve_path::absolute_path;
pub use expand_and_resolve_path::expand_and_resolve_path;
