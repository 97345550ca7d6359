//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `nightfeed_core` linkage and
//!   schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use nightfeed_core::db::open_db_in_memory;

fn main() {
    println!("nightfeed_core version={}", nightfeed_core::core_version());

    match open_db_in_memory() {
        Ok(_conn) => println!("nightfeed_core migrations=ok"),
        Err(err) => {
            eprintln!("nightfeed_core migrations=failed error={err}");
            std::process::exit(1);
        }
    }
}
