use memwallet_pow::difficulty::{compact_to_target, hash_meets_target, target_to_compact};

#[test]
fn compact_to_target_roundtrip() {
    for bits in [0x1d00_ffff, 0x1e00_ffff, 0x207f_ffff] {
        let target = compact_to_target(bits).expect("target");
        assert_eq!(target_to_compact(&target), bits);
    }
}

#[test]
fn compact_target_layout() {
    let target = compact_to_target(0x207f_ffff).expect("target");
    assert!(target[..29].iter().all(|b| *b == 0));
    assert_eq!(target[29], 0xff);
    assert_eq!(target[30], 0xff);
    assert_eq!(target[31], 0x7f);
}

#[test]
fn hash_meets_target_cmp() {
    let target = [0x10u8; 32];
    assert!(hash_meets_target(&[0x00u8; 32], &target));
    assert!(hash_meets_target(&target, &target));
    assert!(!hash_meets_target(&[0xffu8; 32], &target));
}
