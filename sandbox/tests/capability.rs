//! Capability policy applied directly to a fake instance, checking the
//! resulting namespace set and the policy's idempotence.

mod common;

use common::FakeInstance;
use luabox_engine::GuestRng;
use luabox_sandbox::CapabilityPolicy;

fn applied(seed: u64) -> FakeInstance {
    let mut instance = FakeInstance::default();
    CapabilityPolicy
        .apply(&mut instance, GuestRng::from_seed(seed).shared())
        .unwrap();
    instance
}

#[test]
fn test_policy_yields_identical_surfaces_on_fresh_instances() {
    let a = applied(1);
    let b = applied(2);
    // Different seeds, same capability surface.
    assert_eq!(a.bound, b.bound);
    assert_eq!(a.reserved, b.reserved);
}

#[test]
fn test_policy_removes_deny_listed_globals_after_loading_modules() {
    let instance = applied(1);

    // Modules published these, the policy must have cleared them.
    for gone in ["unpack", "loadstring", "math.log10", "table.maxn"] {
        assert!(!instance.bound.contains(gone), "{gone} must be cleared");
    }
    // Siblings from the same modules survive.
    for kept in ["math.floor", "table.insert", "print", "load"] {
        assert!(instance.bound.contains(kept), "{kept} must survive");
    }
}

#[test]
fn test_policy_reserves_exactly_the_host_namespace() {
    let instance = applied(1);
    assert_eq!(
        instance.reserved.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["os"]
    );
}

#[test]
fn test_policy_installs_the_supplied_generator() {
    let instance = applied(1);
    assert!(instance.rng.is_some());
    assert!(instance.bound.contains("math.random"));
    assert!(instance.bound.contains("math.randomseed"));
}
