//! Example: two devices editing shared settings offline, then syncing.
//!
//! Run with `RUST_LOG=lww_dict=debug cargo run --example replicas` to see
//! what each merge takes from its peer.

use lww_dict::clock::HybridClock;
use lww_dict::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    println!("=== Shared settings (LWW-Element-Dictionary) ===\n");

    let laptop_clock = HybridClock::new(1);
    let phone_clock = HybridClock::new(2);

    let mut laptop = LWWDictionary::new(&laptop_clock);
    let mut phone = LWWDictionary::new(&phone_clock);

    laptop.add("theme", "dark".to_string());
    laptop.add("font", "mono".to_string());
    phone.merge(&laptop);
    // Catch the phone's clock up with what it just merged, so its own
    // edits are ordered after the laptop's.
    if let Some(seen) = phone.latest_timestamp() {
        phone_clock.receive(seen);
    }
    println!("Phone after first sync: {:?}", sorted(&phone));

    // Both go offline and edit.
    laptop.add("theme", "solarized".to_string());
    phone.remove("font");
    phone.add("language", "en".to_string());

    println!("\n--- Offline edits ---");
    println!("Laptop: {:?}", sorted(&laptop));
    println!("Phone:  {:?}", sorted(&phone));

    // Sync in both directions; the order does not matter.
    let delta = phone.delta(&laptop);
    println!("\nPhone -> laptop delta carries {} entries", delta.len());
    laptop.apply_delta(&delta);
    phone.merge(&laptop);
    for (replica, clock) in [(&laptop, &laptop_clock), (&phone, &phone_clock)] {
        if let Some(seen) = replica.latest_timestamp() {
            clock.receive(seen);
        }
    }

    println!("\n--- After sync ---");
    println!("Laptop: {:?}", sorted(&laptop));
    println!("Phone:  {:?}", sorted(&phone));
    assert_eq!(sorted(&laptop), sorted(&phone));
    assert_eq!(laptop.get("font"), None);
    assert_eq!(laptop.get("theme").map(String::as_str), Some("solarized"));
}

fn sorted<S: TimestampSource>(d: &LWWDictionary<&'static str, String, S>) -> Vec<(&'static str, String)> {
    let mut entries: Vec<_> = d.iter().map(|(k, v)| (*k, v.clone())).collect();
    entries.sort();
    entries
}
