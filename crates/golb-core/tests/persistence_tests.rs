//! Seed scenarios 2-4 (§8): cookie, IP-hash, and consistent-hash stickiness, driven end to end
//! through the composed dispatch engine rather than each policy in isolation.

use std::collections::HashSet;

use golb_core::config::grammar::parse;
use golb_core::services::factory::Golb;
use golb_core::services::persistence::{DispatchContext, Persistence};

fn three_backend_pool(persistence: &str) -> Golb {
    let config = parse(&format!(
        r#"
        upstream backend {{
            server http://10.0.0.1:9001
            server http://10.0.0.2:9001
            server http://10.0.0.3:9001
        }}
        method round_robin
        persistence {}
        "#,
        persistence
    ))
    .unwrap();
    Golb::from_config(&config, None, None).unwrap()
}

#[test]
fn cookie_stickiness_pins_eleven_requests_to_one_backend() {
    let golb = three_backend_pool("cookie");
    let pool = golb.pool("backend").unwrap();

    let ctx = DispatchContext { cookie_value: None, client_ip: None, path: "/" };
    let first = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap();
    let cookie = first.set_cookie.expect("fresh selection must set a cookie");
    let k = first.index;

    let mut counts = [0u32; 3];
    counts[k] += 1;
    for _ in 0..10 {
        let ctx = DispatchContext { cookie_value: Some(&cookie), client_ip: None, path: "/" };
        let selection = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap();
        assert_eq!(selection.index, k);
        assert!(selection.set_cookie.is_none());
        counts[k] += 1;
    }

    assert_eq!(counts[k], 11);
    for (i, count) in counts.iter().enumerate() {
        if i != k {
            assert_eq!(*count, 0);
        }
    }
}

#[test]
fn ip_hash_sticks_one_source_and_spreads_distinct_sources() {
    let golb = three_backend_pool("ip_hash");
    let pool = golb.pool("backend").unwrap();

    let ctx = DispatchContext { cookie_value: None, client_ip: Some("203.0.113.7"), path: "/" };
    let first = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index;
    for _ in 0..9 {
        let ctx = DispatchContext { cookie_value: None, client_ip: Some("203.0.113.7"), path: "/" };
        let selection = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap();
        assert_eq!(selection.index, first);
    }

    let mut seen = HashSet::new();
    for i in 0..10 {
        let ip = format!("198.51.100.{}", i);
        let ctx = DispatchContext { cookie_value: None, client_ip: Some(&ip), path: "/" };
        seen.insert(pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index);
    }
    assert!(seen.len() >= 2, "ten distinct source IPs should spread across at least two backends");
}

#[test]
fn consistent_hash_is_stable_per_path_and_spreads_across_paths() {
    let golb = three_backend_pool("consistent_hash");
    let pool = golb.pool("backend").unwrap();

    for path in ["/products", "/users"] {
        let ctx = DispatchContext { cookie_value: None, client_ip: None, path };
        let first = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index;
        for _ in 0..4 {
            let ctx = DispatchContext { cookie_value: None, client_ip: None, path };
            let selection = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap();
            assert_eq!(selection.index, first);
        }
    }

    let mut seen = HashSet::new();
    for path in ["/products", "/users", "/orders", "/cart", "/search"] {
        let ctx = DispatchContext { cookie_value: None, client_ip: None, path };
        seen.insert(pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index);
    }
    assert!(seen.len() >= 2, "five distinct paths should spread across at least two backends");
}

#[test]
fn persistence_lookup_is_idempotent_with_no_state_change() {
    let golb = three_backend_pool("ip_hash");
    let pool = golb.pool("backend").unwrap();
    let ctx = DispatchContext { cookie_value: None, client_ip: Some("192.0.2.1"), path: "/" };
    let a = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index;
    let ctx = DispatchContext { cookie_value: None, client_ip: Some("192.0.2.1"), path: "/" };
    let b = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler).unwrap().index;
    assert_eq!(a, b);
}

#[test]
fn building_with_no_persistence_directive_defaults_to_none() {
    let golb = three_backend_pool("none");
    assert!(matches!(golb.pool("backend").unwrap().persistence, Persistence::None));
}
