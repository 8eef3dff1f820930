use super::*;

use crate::prime::is_prime;

#[test]
fn test_reduce_already_prime() {
    for p in [2u32, 3, 5, 7, 23, 104_723, 2_147_483_647] {
        assert_eq!(reduce(p).unwrap(), Reduction { prime: p, steps: 1 });
    }
}

#[test]
fn test_reduce_known_chains() {
    // 76 = 2*2*19 -> 23
    assert_eq!(reduce(76).unwrap(), Reduction { prime: 23, steps: 2 });
    // 100 -> 14 -> 9 -> 6 -> 5
    assert_eq!(reduce(100).unwrap(), Reduction { prime: 5, steps: 5 });
    // 2001 -> 55 -> 16 -> 8 -> 6 -> 5
    assert_eq!(reduce(2001).unwrap(), Reduction { prime: 5, steps: 6 });
    // 999888777 -> 3002712 -> 125122 -> 932 -> 237 -> 82 -> 43
    assert_eq!(
        reduce(999_888_777).unwrap(),
        Reduction { prime: 43, steps: 7 }
    );
}

#[test]
fn test_reduce_terminal_is_prime() {
    for n in (2u32..2_000).filter(|&n| n != 4) {
        let r = reduce(n).unwrap();
        assert!(is_prime(r.prime), "terminal {} of {} not prime", r.prime, n);
        assert!(r.steps >= 1);
        assert_eq!(r.steps == 1, is_prime(n), "step count wrong for {n}");
    }
}

#[test]
fn test_reduce_propagates_invalid_input() {
    assert_eq!(reduce(0), Err(crate::factor::FactorError::InvalidInput(0)));
    assert_eq!(reduce(1), Err(crate::factor::FactorError::InvalidInput(1)));
}

#[test]
fn test_cache_lookup_insert() {
    let cache = ReductionCache::new(2, 100);
    assert_eq!(cache.bounds(), (2, 100));
    assert_eq!(cache.lookup(50), None);
    assert_eq!(cache.lookup(1), None); // below range
    assert_eq!(cache.lookup(101), None); // above range

    let r = Reduction { prime: 5, steps: 5 };
    cache.insert(100, r);
    assert_eq!(cache.lookup(100), Some(r));

    // Idempotent rewrite of the same key.
    cache.insert(100, r);
    assert_eq!(cache.lookup(100), Some(r));

    // Out-of-range insert is ignored.
    cache.insert(101, Reduction { prime: 2, steps: 1 });
    assert_eq!(cache.lookup(101), None);
}

#[test]
fn test_cache_precompute_consistency() {
    // Populating then querying must agree with direct computation for every
    // value in the populated range.
    let cache = ReductionCache::new(2, 2_000);
    cache.precompute().unwrap();

    for n in (2u32..=2_000).filter(|&n| n != 4) {
        let direct = reduce(n).unwrap();
        assert_eq!(cache.lookup(n), Some(direct), "cached entry for {n}");
        assert_eq!(
            reduce_with_cache(n, &cache).unwrap(),
            direct,
            "cached driver result for {n}"
        );
    }
    // The fixed point's slot stays vacant.
    assert_eq!(cache.lookup(4), None);
}

#[test]
fn test_cache_hit_step_accounting() {
    // A hit on an intermediate value must not double-count the step that
    // produced it: 2001 -> 55 -> ... -> 5 is 6 steps with or without the
    // cache entry for 55.
    let cache = ReductionCache::new(2, 100);
    cache.insert(55, reduce(55).unwrap());
    assert_eq!(
        reduce_with_cache(2001, &cache).unwrap(),
        Reduction { prime: 5, steps: 6 }
    );
}

#[test]
fn test_cache_miss_falls_back_to_direct() {
    let cache = ReductionCache::new(2, 10); // far too small to help
    assert_eq!(
        reduce_with_cache(999_888_777, &cache).unwrap(),
        Reduction { prime: 43, steps: 7 }
    );
}

#[test]
fn test_spawn_precompute_joins_clean() {
    let cache = std::sync::Arc::new(ReductionCache::new(2, 500));
    let handle = spawn_precompute(std::sync::Arc::clone(&cache));
    handle.join().unwrap().unwrap();
    for n in (2u32..=500).filter(|&n| n != 4) {
        assert_eq!(cache.lookup(n), Some(reduce(n).unwrap()));
    }
}

#[test]
fn test_queries_during_population() {
    // Readers racing the population thread must always see value-correct
    // results: either a miss (direct computation) or a complete entry.
    let cache = std::sync::Arc::new(ReductionCache::new(2, 5_000));
    let handle = spawn_precompute(std::sync::Arc::clone(&cache));

    for n in (2u32..=5_000).step_by(97).filter(|&n| n != 4) {
        assert_eq!(
            reduce_with_cache(n, &cache).unwrap(),
            reduce(n).unwrap(),
            "racing query for {n}"
        );
    }

    handle.join().unwrap().unwrap();
}

// Integration tests using the binary
#[cfg(test)]
mod integration {
    use std::io::Write;
    use std::process::Command;

    fn bin_path() -> std::path::PathBuf {
        let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("target");
        if cfg!(debug_assertions) {
            path.push("debug");
        } else {
            path.push("release");
        }
        path.push("fpreduce");
        path
    }

    fn run_preduce(args: &[&str]) -> (String, String, i32) {
        let output = Command::new(bin_path())
            .args(args)
            .output()
            .expect("failed to spawn fpreduce");
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code().unwrap_or(1);
        (stdout, stderr, code)
    }

    fn run_preduce_stdin(args: &[&str], input: &str) -> (String, String, i32) {
        let mut child = Command::new(bin_path())
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .expect("failed to spawn fpreduce");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        let output = child.wait_with_output().expect("failed to wait");
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = output.status.code().unwrap_or(1);
        (stdout, stderr, code)
    }

    #[test]
    fn test_preduce_args() {
        let (stdout, _, code) = run_preduce(&["76", "2001", "999888777"]);
        assert_eq!(code, 0);
        assert_eq!(stdout, "23 2\n5 6\n43 7\n");
    }

    #[test]
    fn test_preduce_stdin_sentinel() {
        // Input ends at the sentinel; values after it are ignored.
        let (stdout, _, code) = run_preduce_stdin(&[], "76\n2001\n4\n999\n");
        assert_eq!(code, 0);
        assert_eq!(stdout, "23 2\n5 6\n");
    }

    #[test]
    fn test_preduce_stdin_eof_without_sentinel() {
        let (stdout, _, code) = run_preduce_stdin(&[], "2\n100\n");
        assert_eq!(code, 0);
        assert_eq!(stdout, "2 1\n5 5\n");
    }

    #[test]
    fn test_preduce_custom_sentinel() {
        let (stdout, _, code) = run_preduce_stdin(&["--sentinel=9999"], "76\n9999\n2001\n");
        assert_eq!(code, 0);
        assert_eq!(stdout, "23 2\n");
    }

    #[test]
    fn test_preduce_precompute_matches_direct() {
        let input = "76\n100\n2001\n999888777\n4\n";
        let (direct, _, code_a) = run_preduce_stdin(&[], input);
        let (cached, _, code_b) = run_preduce_stdin(&["--precompute=100000"], input);
        assert_eq!(code_a, 0);
        assert_eq!(code_b, 0);
        assert_eq!(direct, cached);
    }

    #[test]
    fn test_preduce_invalid_input_is_fatal() {
        let (stdout, stderr, code) = run_preduce(&["abc"]);
        assert_eq!(code, 1);
        assert_eq!(stdout, "");
        assert!(stderr.contains("abc"));

        let (stdout, stderr, code) = run_preduce(&["1"]);
        assert_eq!(code, 1);
        assert_eq!(stdout, "");
        assert!(stderr.contains("1"));
    }

    #[test]
    fn test_preduce_rejects_fixed_point() {
        let (_, stderr, code) = run_preduce(&["4"]);
        assert_eq!(code, 1);
        assert!(stderr.contains("4"));
    }

    #[test]
    fn test_preduce_help_version() {
        let (stdout, _, code) = run_preduce(&["--help"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("Usage:"));

        let (stdout, _, code) = run_preduce(&["--version"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("preduce"));
    }

    #[test]
    fn test_preduce_unrecognized_option() {
        let (_, stderr, code) = run_preduce(&["--bogus"]);
        assert_eq!(code, 1);
        assert!(stderr.contains("--bogus"));
    }
}
