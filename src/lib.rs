//! Empty crate root: this package exists only to hold the workspace-wide
//! integration tests under `tests/` and their dev-dependencies. The
//! actual implementation lives in the `cache-proxy*` crates under
//! `crates/`.
